/// Initializes global logger.
///
/// `RUST_LOG` is honored, on top of it crate and `root_module` are raised to `Trace` when
/// `verbose` is set.
pub fn configure(
    root_module: &str,
    verbose: bool,
) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(log::LevelFilter::Info);
    if verbose {
        builder
            .filter_module("logicblocks_subserver", log::LevelFilter::Trace)
            .filter_module(root_module, log::LevelFilter::Trace);
    }
    builder.init();
}
