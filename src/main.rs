fn main() -> std::process::ExitCode {
    image_intake::run()
}
