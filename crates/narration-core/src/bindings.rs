use crate::controller::PlaybackState;
use crate::progress::ProgressReport;
use crate::transport::{TransportEvent, TransportView};
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Regenerate the TypeScript declarations consumed by presentation layers.
///
/// Stale `.ts` files in `out_dir` are removed first.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<PlaybackState>(out_dir)?;
    export_single_type::<ProgressReport>(out_dir)?;
    export_single_type::<TransportView>(out_dir)?;
    export_single_type::<TransportEvent>(out_dir)?;
    Ok(())
}
