fn main() -> anyhow::Result<()> {
    clipkit::cli::run_cli()
}
