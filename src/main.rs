fn main() -> anyhow::Result<()> {
    repcoach_lib::run()
}
