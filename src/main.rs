use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::debug;

use rusty_select::cli::Opt;
use rusty_select::commands;

fn main() -> Result<()> {
    let opt = Opt::parse();

    let env = Env::default().filter_or("RUSTY_SELECT_LOG", opt.loglevel());
    env_logger::init_from_env(env);
    debug!("settings: {opt:#?}");

    commands::run(&opt)
}
