fn main() -> anyhow::Result<()> {
    uilabel::run()?;
    Ok(())
}
