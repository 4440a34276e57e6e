use alloy::signers::local::PrivateKeySigner;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug)]
pub struct KeystoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl KeystoreDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_keystore_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_keystore_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_keystore_dir(),
    }
}

/// Web3 secret-storage files: either extensionless (cast wallet) or `.json`.
pub fn list_keystores(dir: &Path) -> Result<Vec<KeystoreDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut keystores = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            None | Some("json") => {}
            Some(_) => continue,
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        if name.starts_with('.') {
            continue;
        }
        keystores.push(KeystoreDescriptor::new(name, path));
    }
    keystores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keystores)
}

pub fn find_keystore(dir: &Path, name: &str) -> Result<KeystoreDescriptor> {
    list_keystores(dir)?
        .into_iter()
        .find(|k| k.name == name)
        .ok_or_else(|| eyre!("Keystore '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_keystore(descriptor: &KeystoreDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for keystore '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for keystore '{}'", descriptor.name))?;
    PrivateKeySigner::from_slice(&secret).map_err(|err| {
        eyre!(
            "Keystore '{}' does not hold a secp256k1 key: {err}",
            descriptor.name
        )
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn list_keystores__mixed_directory__keeps_keystore_files_sorted() {
        // given
        let dir = TempDir::new("keystores").unwrap();
        fs::write(dir.path().join("deployer"), "{}").unwrap();
        fs::write(dir.path().join("alice.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join(".DS_Store"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        // when
        let keystores = list_keystores(dir.path()).unwrap();

        // then
        let names: Vec<_> = keystores.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "deployer"]);
    }

    #[test]
    fn find_keystore__missing_name__errors() {
        let dir = TempDir::new("keystores").unwrap();
        assert!(find_keystore(dir.path(), "bob").is_err());
    }

    #[test]
    fn resolve_keystore_dir__explicit_path__is_used_verbatim() {
        let resolved = resolve_keystore_dir(Some("/tmp/keys")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/keys"));
    }
}
