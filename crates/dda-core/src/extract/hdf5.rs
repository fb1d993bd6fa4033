use std::path::Path;

#[cfg(feature = "hdf5")]
pub(super) fn read_dataset(path: &Path, dataset: &str) -> Option<Vec<f64>> {
    use tracing::debug;

    let file = match hdf5::File::open(path) {
        Ok(file) => file,
        Err(error) => {
            debug!(path = %path.display(), %error, "failed to open hdf5 file");
            return None;
        }
    };
    let values = file
        .dataset(dataset)
        .and_then(|dataset| dataset.read_raw::<f64>());
    match values {
        Ok(values) => Some(values),
        Err(error) => {
            debug!(path = %path.display(), dataset, %error, "failed to read hdf5 dataset");
            None
        }
    }
}

#[cfg(not(feature = "hdf5"))]
pub(super) fn read_dataset(path: &Path, dataset: &str) -> Option<Vec<f64>> {
    use std::sync::Once;
    use tracing::warn;

    static WARN_ONCE: Once = Once::new();
    WARN_ONCE.call_once(|| {
        warn!(
            path = %path.display(),
            dataset,
            "hdf5 support is not compiled in; rebuild with the `hdf5` feature to read datasets"
        );
    });
    None
}
