//! Generate a new participant keypair.
use anyhow::{bail, Result};
use k256::schnorr::SigningKey;
use rand::rngs::OsRng;
use std::path::PathBuf;
use tokio::{fs, io::AsyncWriteExt};

/// Generate a BIP-340 keypair, write the secret to file and print
/// the public key.
pub async fn run(path: PathBuf, force: bool) -> Result<()> {
    if fs::try_exists(&path).await? && !force {
        bail!(
            "file {} already exists, use --force to overwrite",
            path.display()
        );
    }

    let signing_key = SigningKey::random(&mut OsRng);
    let secret = hex::encode(signing_key.to_bytes());

    let mut file = fs::File::create(&path).await?;
    file.write_all(secret.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;

    println!(
        "{}",
        hex::encode(signing_key.verifying_key().to_bytes())
    );

    Ok(())
}
