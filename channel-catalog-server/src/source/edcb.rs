//! EDCB backend.
//!
//! The service list comes from EDCB's `ChSet5.txt`, which carries no remote
//! control keys. Those come from a separate schedule-derived service list
//! that may be empty or incomplete.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use channel_catalog::normalize::{decode_chset5, parse_chset5};
use channel_catalog::numbering::sort_by_network_order;
use channel_catalog::EpgService;
use log::{debug, warn};
use tokio::time::timeout;

use super::{BackendKind, Result, ServiceSource, SourceError, SourceSnapshot};

/// Channel settings file every EDCB installation keeps.
pub const CHSET5_FILE_NAME: &str = "ChSet5.txt";

/// The two EDCB queries the catalog needs.
#[async_trait]
pub trait EdcbClient: Send + Sync {
    /// Contents of a file in EDCB's setting folder, `None` if EDCB has no such file.
    async fn file_copy(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Services that have schedule data, `None` if EDCB cannot provide them.
    async fn enum_service(&self) -> Result<Option<Vec<EpgService>>>;
}

/// [`EdcbClient`] over a local (or mounted) EDCB `Setting` directory.
///
/// Schedule data is not available this way. Remote control keys come from a
/// configured list instead; without one, terrestrial keys fall back to the
/// previously stored values.
#[derive(Debug, Clone)]
pub struct EdcbSettingDirectory {
    dir: PathBuf,
    remote_control_keys: Vec<EpgService>,
}

impl EdcbSettingDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            remote_control_keys: Vec::new(),
        }
    }

    pub fn with_remote_control_keys(mut self, keys: Vec<EpgService>) -> Self {
        self.remote_control_keys = keys;
        self
    }
}

#[async_trait]
impl EdcbClient for EdcbSettingDirectory {
    async fn file_copy(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn enum_service(&self) -> Result<Option<Vec<EpgService>>> {
        if self.remote_control_keys.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.remote_control_keys.clone()))
    }
}

/// [`ServiceSource`] backed by any [`EdcbClient`].
pub struct EdcbSource {
    client: Box<dyn EdcbClient>,
    timeout: Duration,
}

impl EdcbSource {
    pub fn new(client: Box<dyn EdcbClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch_epg_services(&self) -> Vec<EpgService> {
        match timeout(self.timeout, self.client.enum_service()).await {
            Ok(Ok(Some(services))) => services,
            Ok(Ok(None)) => {
                debug!("[EDCB] No schedule-derived service list available");
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!("[EDCB] Failed to enumerate services: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("[EDCB] Service enumeration timed out after {:?}", self.timeout);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ServiceSource for EdcbSource {
    fn kind(&self) -> BackendKind {
        BackendKind::Edcb
    }

    async fn fetch(&self) -> Result<SourceSnapshot> {
        let bytes = timeout(self.timeout, self.client.file_copy(CHSET5_FILE_NAME))
            .await
            .map_err(|_| SourceError::Timeout(self.timeout))??
            .ok_or_else(|| SourceError::Unavailable(format!("{} could not be retrieved", CHSET5_FILE_NAME)))?;

        let text = decode_chset5(&bytes);
        let mut services = Vec::new();
        for entry in parse_chset5(&text) {
            match entry {
                Ok(service) => services.push(service.to_canonical()),
                Err(e) => warn!("[EDCB] Skipping {} entry: {}", CHSET5_FILE_NAME, e),
            }
        }

        // Branch numbers depend on order; ChSet5 order is arbitrary.
        sort_by_network_order(&mut services);

        let epg_services = self.fetch_epg_services().await;
        debug!(
            "[EDCB] {} services, {} schedule-derived entries",
            services.len(),
            epg_services.len()
        );

        Ok(SourceSnapshot {
            services,
            epg_services,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHSET5: &str = "NHK BS\tBS Digital\t4\t16625\t101\t1\t0\t1\t1\r\n\
ＮＨＫ総合１・東京\tＮＨＫ総合・東京\t32736\t32736\t1024\t1\t0\t1\t1\r\n\
broken line\r\n\
ＮＨＫＥテレ１東京\tＮＨＫＥテレ東京\t32737\t32737\t1032\t1\t0\t1\t1\r\n";

    struct FakeEdcb {
        chset5: Option<Vec<u8>>,
        epg: Result<Option<Vec<EpgService>>>,
        delay: Duration,
    }

    impl FakeEdcb {
        fn new(chset5: Option<&str>) -> Self {
            Self {
                chset5: chset5.map(|s| s.as_bytes().to_vec()),
                epg: Ok(None),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl EdcbClient for FakeEdcb {
        async fn file_copy(&self, name: &str) -> Result<Option<Vec<u8>>> {
            assert_eq!(name, CHSET5_FILE_NAME);
            tokio::time::sleep(self.delay).await;
            Ok(self.chset5.clone())
        }

        async fn enum_service(&self) -> Result<Option<Vec<EpgService>>> {
            match &self.epg {
                Ok(services) => Ok(services.clone()),
                Err(_) => Err(SourceError::Unavailable("pipe closed".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_sorts_and_skips_malformed() {
        let mut fake = FakeEdcb::new(Some(CHSET5));
        fake.epg = Ok(Some(vec![EpgService {
            network_id: 32736,
            service_id: 1024,
            remote_control_key_id: 1,
        }]));
        let source = EdcbSource::new(Box::new(fake), Duration::from_secs(5));

        let snapshot = source.fetch().await.unwrap();
        let ids: Vec<_> = snapshot.services.iter().map(|s| s.channel_id()).collect();
        assert_eq!(ids, vec!["NID4-SID101", "NID32736-SID1024", "NID32737-SID1032"]);
        assert_eq!(snapshot.services[1].name, "NHK総合1・東京");
        assert_eq!(snapshot.services[1].transport_stream_id, Some(32736));
        assert_eq!(snapshot.epg_services.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_chset5_is_an_error() {
        let source = EdcbSource::new(Box::new(FakeEdcb::new(None)), Duration::from_secs(5));
        assert!(matches!(source.fetch().await, Err(SourceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_enum_service_failure_degrades() {
        let mut fake = FakeEdcb::new(Some(CHSET5));
        fake.epg = Err(SourceError::Unavailable(String::new()));
        let source = EdcbSource::new(Box::new(fake), Duration::from_secs(5));

        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot.services.len(), 3);
        assert!(snapshot.epg_services.is_empty());
    }

    #[tokio::test]
    async fn test_file_copy_timeout() {
        let mut fake = FakeEdcb::new(Some(CHSET5));
        fake.delay = Duration::from_secs(2);
        let source = EdcbSource::new(Box::new(fake), Duration::from_millis(50));

        assert!(matches!(source.fetch().await, Err(SourceError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_setting_directory() {
        let dir = std::env::temp_dir().join(format!("channel-catalog-edcb-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let client = EdcbSettingDirectory::new(&dir);

        assert!(client.file_copy(CHSET5_FILE_NAME).await.unwrap().is_none());

        std::fs::write(dir.join(CHSET5_FILE_NAME), CHSET5).unwrap();
        let bytes = client.file_copy(CHSET5_FILE_NAME).await.unwrap().unwrap();
        assert_eq!(bytes, CHSET5.as_bytes());
        assert!(client.enum_service().await.unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_setting_directory_remote_control_keys() {
        let dir = std::env::temp_dir().join(format!("channel-catalog-edcb-keys-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CHSET5_FILE_NAME), CHSET5).unwrap();

        let keys = vec![EpgService {
            network_id: 32736,
            service_id: 1024,
            remote_control_key_id: 1,
        }];
        let client = EdcbSettingDirectory::new(&dir).with_remote_control_keys(keys.clone());
        let source = EdcbSource::new(Box::new(client), Duration::from_secs(5));

        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot.epg_services, keys);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
