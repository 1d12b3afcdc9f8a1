//! Persistent worker identity.

use anyhow::{Context, Result};
use rand::Rng;
use std::path::Path;

pub const ID_FILE: &str = "id";
pub const ID_LENGTH: usize = 5;

/// Reads `<dir>/id`, or generates and stores a fresh lowercase id.
pub fn load_or_create(dir: &Path) -> Result<String> {
    let path = dir.join(ID_FILE);

    match std::fs::read_to_string(&path) {
        Ok(id) if !id.trim().is_empty() => return Ok(id.trim().to_string()),
        Ok(_) => tracing::warn!("{} is empty; generating a new id", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    }

    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let id = random_id();
    std::fs::write(&path, &id).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Generated worker id {}", id);
    Ok(id)
}

pub fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}
