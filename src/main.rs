fn main() -> std::process::ExitCode {
    imgloc_lib::run()
}
