use std::{
    io::{self, Write},
    sync::Arc,
};

use clap::Parser;
use log::info;

use fontsub::{report::format_summary, run, Args, CommandSubsetter, Config, Error};

fn main() -> Result<(), Error> {
    env_logger::builder()
        .format(|buf, record| {
            let ts = buf.timestamp_micros();
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{}: {:?}: {style}{}{style:#}: {}",
                ts,
                std::thread::current().id(),
                record.level(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = Config::from_args(&args)?;
    info!("Subsetting with {config:?}");

    let subsetter = CommandSubsetter::new(config.subsetter.clone());
    let lines = run(&args, &config, Arc::new(subsetter))?;

    if lines.is_empty() {
        info!("No fonts were subset");
        return Ok(());
    }
    io::stdout()
        .write_all(format_summary(&lines).as_bytes())
        .map_err(Error::StdioWriteFail)
}
