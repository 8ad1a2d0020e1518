/// Whether a run talks to the outside world: an outer enum so that dry runs are handled everywhere.
#[derive(Clone, Debug)]
pub enum RunType<T> {
    /// Nothing is read from or written to Notion or the registry. Print what would happen instead.
    DryRun,
    /// Actually do the thing, using the contained credentials.
    Real(T),
}
