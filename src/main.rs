mod actions;
use actions::action_run;
use anyhow::Result;
use seahorse::{App, Flag, FlagType};
use std::env;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let app = App::new(env!("CARGO_PKG_NAME"))
        .description(env!("CARGO_PKG_DESCRIPTION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .usage("flowsphere [path to config files]")
        .flag(
            Flag::new("inputs", FlagType::String)
                .description("json file with answers for userPrompts"),
        )
        .flag(Flag::new("no-browser", FlagType::Bool).description("Do not open launchBrowser urls"))
        .action(action_run);
    app.run(args);
    Ok(())
}
