use std::error::Error;

/// Print an error followed by every `source` in its chain, one per line. Used
/// as the `Debug` impl of our error enums, so that `{:?}` in logs shows the
/// underlying cause (e.g. the reqwest error behind an unavailable provider)
/// rather than just the top-level message.
pub fn error_chain_fmt(
    e: &impl Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{e}")?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{cause}")?;
        current = cause.source();
    }
    Ok(())
}
