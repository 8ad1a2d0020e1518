use env_logger::Env;
use miette::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    relnote_sync::run()
}
