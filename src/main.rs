fn main() -> anyhow::Result<()> {
    ytnotes::cli::run()
}
