use regress_runner::prelude::*;

fn main() -> RegressResult<()> {
    let cli = init();

    let outcome = run(RunDefinitionBuilder::new(cli).load_settings()?)?;

    if !outcome.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}
