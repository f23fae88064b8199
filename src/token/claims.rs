use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ALGORITHM: &str = "HS256";
pub const TOKEN_TYPE: &str = "JWT";

pub const REGION: &str = "BD";
pub const COUNTRY_CODE: &str = "SG";
pub const CLIENT_VERSION: &str = "1.108.3";
pub const RELEASE_CHANNEL: &str = "3rd_party";
pub const RELEASE_VERSION: &str = "OB50";
pub const EXTERNAL_TYPE: u8 = 4;
pub const PLATFORM_ID: u8 = 1;
pub const CLIENT_TYPE: u8 = 2;
pub const SOURCE: u8 = 4;
pub const EMULATOR_SCORE: u8 = 100;
pub const REG_AVATAR: u64 = 102_000_007;
pub const USING_VERSION: u8 = 1;

pub const ACCOUNT_ID_MIN: u64 = 1_000_000_000;
pub const ACCOUNT_ID_MAX: u64 = 9_999_999_999;
pub const EXTERNAL_ID_LEN: usize = 26;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const NICKNAME_PREFIXES: &[&str] = &[
    "Anta", "Gunn", "Micro", "Soot", "Joe", "Beat", "Pard", "Rick", "Nite", "Bon", "Lily", "Gyro",
    "Razor", "Fall", "Ash", "Fish", "Orca", "Note", "Merc", "Anya", "Mary", "Mutant", "Mole", "Mess",
    "Whiz", "Poe", "Retro", "Cherub", "Nug", "Emi", "King", "Fry", "Elk", "Bone", "Seal", "Mantis",
    "Ave", "Path", "Tacit", "Star", "Paige", "Guy", "Halo", "Knee", "Fang", "Song", "Cobalt", "Neo",
    "Perma", "Tee", "Roll", "Love", "Heavy",
];

const NICKNAME_SUFFIXES: &[&str] = &[
    "4?0r9O", "1v4n5", "op0o1L5", "3t7m1)7_", "2p2F3", "1O6x0m", "7!2f4I", "9M7y2t4Y", "N42aT4(9Z",
    "2@7n8s8", "8i1l0!", "2Q6X2x1d", "1Y4O2a1", "9T0x2X2l", "4a3f3fbc7", "3S6W4!0", "7F3M0T",
    "1@8a1w9", "9@6", "4bfa4af4de", "23562cb2f9", "0@4@3V5", "0n5E5", "6P6!2", "0Y2j1D1_0", "6a2j4B",
    "9k3G5&3", "8k7G5&3", "7j4N0T", "6s0a8R", "1o2b9", "8y4B", "9X9z4", "0B9t8", "7I3m7U", "0a9b97f",
    "9X9s4", "1q1D9Q", "3y1q4", "6n6O2", "9D0f9", "2q!3t6s6", "1a1l7Y",
];

/// JOSE header. `svr` and `ver` ride along with the standard fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub svr: String,
    pub typ: String,
    pub ver: String,
}

impl TokenHeader {
    pub fn new(server_id: &str) -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            svr: server_id.to_string(),
            typ: TOKEN_TYPE.to_string(),
            ver: RELEASE_VERSION.to_string(),
        }
    }
}

/// Claim set of one guest token. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub account_id: u64,
    pub nickname: String,
    pub noti_region: String,
    pub lock_region: String,
    pub external_id: String,
    pub external_type: u8,
    pub plat_id: u8,
    pub client_version: String,
    pub emulator_score: u8,
    pub is_emulator: bool,
    pub country_code: String,
    pub external_uid: i64,
    pub reg_avatar: u64,
    pub source: u8,
    pub lock_region_time: i64,
    pub client_type: u8,
    pub signature_md5: String,
    pub using_version: u8,
    pub release_channel: String,
    pub release_version: String,
    pub exp: i64,
}

impl TokenPayload {
    /// Claims for `external_uid` issued at `issued_at`, expiring `validity_seconds` later.
    /// `account_id`, `nickname` and `external_id` are decorative and drawn at random.
    pub fn issue<R: Rng>(
        rng: &mut R,
        external_uid: i64,
        issued_at: i64,
        validity_seconds: u64,
    ) -> Self {
        Self {
            account_id: random_account_id(rng),
            nickname: random_nickname(rng),
            noti_region: REGION.to_string(),
            lock_region: REGION.to_string(),
            external_id: random_external_id(rng),
            external_type: EXTERNAL_TYPE,
            plat_id: PLATFORM_ID,
            client_version: CLIENT_VERSION.to_string(),
            emulator_score: EMULATOR_SCORE,
            is_emulator: true,
            country_code: COUNTRY_CODE.to_string(),
            external_uid,
            reg_avatar: REG_AVATAR,
            source: SOURCE,
            lock_region_time: issued_at,
            client_type: CLIENT_TYPE,
            signature_md5: String::new(),
            using_version: USING_VERSION,
            release_channel: RELEASE_CHANNEL.to_string(),
            release_version: RELEASE_VERSION.to_string(),
            exp: issued_at + validity_seconds as i64,
        }
    }
}

pub fn random_account_id<R: Rng>(rng: &mut R) -> u64 {
    rng.random_range(ACCOUNT_ID_MIN..=ACCOUNT_ID_MAX)
}

pub fn random_nickname<R: Rng>(rng: &mut R) -> String {
    let prefix = NICKNAME_PREFIXES.choose(rng).copied().unwrap_or("Guest");
    let suffix = NICKNAME_SUFFIXES.choose(rng).copied().unwrap_or_default();
    format!("{prefix}{suffix}")
}

pub fn random_external_id<R: Rng>(rng: &mut R) -> String {
    (0..EXTERNAL_ID_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

pub fn is_known_nickname(nickname: &str) -> bool {
    NICKNAME_PREFIXES.iter().any(|prefix| {
        nickname
            .strip_prefix(prefix)
            .is_some_and(|rest| NICKNAME_SUFFIXES.contains(&rest))
    })
}
