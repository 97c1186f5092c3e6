fn main() -> std::process::ExitCode {
    shelfsight_lib::run()
}
