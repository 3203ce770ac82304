use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::board::BoardStore;
use crate::connections::ConnectionGraph;
use crate::content::PlayerVitals;
use crate::coord::{ZoneCoordinate, ZoneKeyError};
use crate::flags::WorldFlags;
use crate::session::GameSession;
use crate::zone::{EnemyId, ZoneData};

pub const SAVE_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to access save file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode save file {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("save file {path} is malformed at {json_path}: {message}")]
    Parse {
        path: PathBuf,
        json_path: String,
        message: String,
    },
    #[error("save file {path} has format version {found}, expected {expected}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u16,
        expected: u16,
    },
    #[error("save file {path} payload hash mismatch")]
    HashMismatch { path: PathBuf },
    #[error("save file {path} holds a bad zone key: {source}")]
    ZoneKey {
        path: PathBuf,
        #[source]
        source: ZoneKeyError,
    },
}

/// On-disk wrapper. The payload is kept as the exact string that was hashed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveEnvelope {
    format_version: u16,
    payload_sha256_hex: String,
    payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavePayload {
    seed: u64,
    zones: Vec<(String, ZoneData)>,
    defeated: Vec<EnemyId>,
    flags: WorldFlags,
    connections: ConnectionGraph,
    vitals: PlayerVitals,
    #[serde(default)]
    current_zone: Option<ZoneCoordinate>,
}

pub fn save_session(session: &GameSession, path: &Path) -> Result<(), SaveError> {
    let payload = SavePayload {
        seed: session.seed(),
        zones: session.repository.entries(),
        defeated: session.defeated.entries(),
        flags: session.flags.clone(),
        connections: session.connections.clone(),
        vitals: session.vitals,
        current_zone: session.live.as_ref().map(|live| live.coord),
    };
    let encode = |source| SaveError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let payload = serde_json::to_string(&payload).map_err(encode)?;
    let envelope = SaveEnvelope {
        format_version: SAVE_FORMAT_VERSION,
        payload_sha256_hex: sha256_hex(payload.as_bytes()),
        payload,
    };
    let text = serde_json::to_string_pretty(&envelope).map_err(encode)?;
    write_text_atomic(path, &text).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        zones = session.repository.len(),
        defeated = session.defeated.len(),
        "session_saved"
    );
    Ok(())
}

/// Replaces the session's world with the saved one. Nothing is touched
/// unless the whole file verifies. Returns the zone the player was in.
pub fn load_session(
    session: &mut GameSession,
    boards: &mut BoardStore,
    path: &Path,
) -> Result<Option<ZoneCoordinate>, SaveError> {
    let raw = fs::read_to_string(path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let envelope: SaveEnvelope = parse_json(path, &raw)?;
    if envelope.format_version != SAVE_FORMAT_VERSION {
        return Err(SaveError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: envelope.format_version,
            expected: SAVE_FORMAT_VERSION,
        });
    }
    if sha256_hex(envelope.payload.as_bytes()) != envelope.payload_sha256_hex {
        return Err(SaveError::HashMismatch {
            path: path.to_path_buf(),
        });
    }
    let payload: SavePayload = parse_json(path, &envelope.payload)?;
    for (key, _) in &payload.zones {
        key.parse::<ZoneCoordinate>()
            .map_err(|source| SaveError::ZoneKey {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let zone_count = payload.zones.len();
    session.repository.restore(payload.zones);
    session.defeated.restore(payload.defeated);
    session.flags = payload.flags;
    session.connections = payload.connections;
    session.vitals = payload.vitals;
    session.reseed_after_restore(payload.seed);
    for claim in session.flags.board_claims() {
        boards.register_board_at(claim.coord(), &claim.board, claim.kind);
    }
    info!(
        path = %path.display(),
        zones = zone_count,
        defeated = session.defeated.len(),
        "session_loaded"
    );
    Ok(payload.current_zone)
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, raw: &str) -> Result<T, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| SaveError::Parse {
        path: path.to_path_buf(),
        json_path: error.path().to_string(),
        message: error.inner().to_string(),
    })
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text.as_bytes())?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("session.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    to_hex_lower(&Sha256::digest(bytes))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::board::{BoardKind, MemoryBoardSource};
    use crate::config::WorldConfig;
    use crate::coord::Side;
    use crate::orchestrator::{ZoneEntryRequest, ZoneOrchestrator};
    use crate::test_support::test_registry;

    fn played_session(boards: &mut BoardStore) -> GameSession {
        let registry = test_registry();
        let orchestrator = ZoneOrchestrator::default();
        let mut session = GameSession::new(WorldConfig::default());
        // (3,0) is level 2; the next zone east is the first level-3 zone
        for _ in 0..5 {
            session.flags.record_zone_visit();
        }
        let mut coord = ZoneCoordinate::surface(3, 0);
        orchestrator
            .enter_zone(&mut session, &registry, boards, ZoneEntryRequest::new(coord))
            .expect("enter");
        for _ in 0..3 {
            let request = ZoneEntryRequest::crossing(coord, Side::East);
            coord = request.coord;
            orchestrator
                .enter_zone(&mut session, &registry, boards, request)
                .expect("enter");
        }
        session.defeat_enemy(&EnemyId("1,1,0#rat@2,2".to_string()));
        session
    }

    #[test]
    fn save_and_load_restore_the_world() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("saves").join("slot1.json");
        let mut boards = BoardStore::new(MemoryBoardSource::new());
        let saved = played_session(&mut boards);
        save_session(&saved, &path).expect("save");
        assert!(!dir.path().join("saves").join("slot1.json.tmp").exists());

        let mut fresh_boards = BoardStore::new(MemoryBoardSource::new());
        let mut loaded = GameSession::new(WorldConfig::default());
        let current = load_session(&mut loaded, &mut fresh_boards, &path).expect("load");

        assert_eq!(current, saved.live.as_ref().map(|live| live.coord));
        assert_eq!(loaded.repository, saved.repository);
        assert_eq!(loaded.defeated, saved.defeated);
        assert_eq!(loaded.flags, saved.flags);
        assert_eq!(loaded.connections, saved.connections);
        assert_eq!(loaded.seed(), saved.seed());
        assert!(!loaded.is_fresh_start());
        assert!(loaded.live.is_none());
        for claim in saved.flags.board_claims() {
            assert_eq!(
                fresh_boards.board_at(&claim.coord()),
                Some((claim.board.as_str(), claim.kind))
            );
        }
    }

    #[test]
    fn shack_claim_survives_a_reload() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("slot.json");
        let mut boards = BoardStore::new(MemoryBoardSource::new());
        let saved = played_session(&mut boards);
        assert!(saved.flags.has_flag("wilds_shack"));
        save_session(&saved, &path).expect("save");

        let mut fresh_boards = BoardStore::new(MemoryBoardSource::new());
        let mut loaded = GameSession::new(WorldConfig::default());
        load_session(&mut loaded, &mut fresh_boards, &path).expect("load");
        assert!(loaded.flags.has_flag("wilds_shack"));
        assert!(fresh_boards
            .board_at(&ZoneCoordinate::interior(4, 0))
            .is_some_and(|(name, kind)| name == "shack" && kind == BoardKind::Canon));
    }

    #[test]
    fn tampered_payload_is_rejected_and_session_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("slot.json");
        let mut boards = BoardStore::new(MemoryBoardSource::new());
        save_session(&played_session(&mut boards), &path).expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        let mut envelope: serde_json::Value = serde_json::from_str(&raw).expect("json");
        let payload = envelope["payload"].as_str().expect("payload").replacen("\"seed\"", "\"seed\" ", 1);
        envelope["payload"] = serde_json::Value::String(payload);
        fs::write(&path, envelope.to_string()).expect("write");

        let mut session = GameSession::new(WorldConfig::default());
        let err = load_session(&mut session, &mut boards, &path).expect_err("tampered");
        assert!(matches!(err, SaveError::HashMismatch { .. }));
        assert!(session.repository.is_empty());
        assert!(session.is_fresh_start());
    }

    #[test]
    fn unknown_format_version_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("slot.json");
        let payload = "{}".to_string();
        let envelope = SaveEnvelope {
            format_version: 7,
            payload_sha256_hex: sha256_hex(payload.as_bytes()),
            payload,
        };
        fs::write(&path, serde_json::to_string(&envelope).expect("encode")).expect("write");

        let mut boards = BoardStore::new(MemoryBoardSource::new());
        let mut session = GameSession::new(WorldConfig::default());
        let err = load_session(&mut session, &mut boards, &path).expect_err("version");
        assert!(matches!(
            err,
            SaveError::UnsupportedVersion {
                found: 7,
                expected: SAVE_FORMAT_VERSION,
                ..
            }
        ));
    }

    #[test]
    fn malformed_payload_reports_json_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("slot.json");
        let payload = r#"{"seed": "many"}"#.to_string();
        let envelope = SaveEnvelope {
            format_version: SAVE_FORMAT_VERSION,
            payload_sha256_hex: sha256_hex(payload.as_bytes()),
            payload,
        };
        fs::write(&path, serde_json::to_string(&envelope).expect("encode")).expect("write");

        let mut boards = BoardStore::new(MemoryBoardSource::new());
        let mut session = GameSession::new(WorldConfig::default());
        match load_session(&mut session, &mut boards, &path).expect_err("malformed") {
            SaveError::Parse { json_path, .. } => assert_eq!(json_path, "seed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let mut boards = BoardStore::new(MemoryBoardSource::new());
        let mut session = GameSession::new(WorldConfig::default());
        let err = load_session(&mut session, &mut boards, &dir.path().join("absent.json"))
            .expect_err("missing");
        assert!(matches!(err, SaveError::Io { .. }));
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(to_hex_lower(&[0x00, 0x0f, 0xab]), "000fab");
        assert_eq!(sha256_hex(b"").len(), 64);
    }
}
