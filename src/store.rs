use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::currency::Currency;
use crate::error::GatewayError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
}

impl AccountStatus {
    fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
        }
    }

    fn parse(raw: &str) -> Result<Self, StoreError> {
        match raw {
            "active" => Ok(AccountStatus::Active),
            other => Err(StoreError::Corrupt(format!("unknown account status: {other}"))),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub status: AccountStatus,
    pub balances: BTreeMap<Currency, u64>,
    pub created_at_ms: i64,
}

impl Account {
    pub fn balance(&self, currency: Currency) -> u64 {
        self.balances.get(&currency).copied().unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    LlmUsage,
    TransferOut,
    TransferIn,
    Conversion,
}

impl EntryKind {
    fn as_str(self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::LlmUsage => "llm_usage",
            EntryKind::TransferOut => "transfer_out",
            EntryKind::TransferIn => "transfer_in",
            EntryKind::Conversion => "conversion",
        }
    }

    fn parse(raw: &str) -> Result<Self, StoreError> {
        match raw {
            "deposit" => Ok(EntryKind::Deposit),
            "llm_usage" => Ok(EntryKind::LlmUsage),
            "transfer_out" => Ok(EntryKind::TransferOut),
            "transfer_in" => Ok(EntryKind::TransferIn),
            "conversion" => Ok(EntryKind::Conversion),
            other => Err(StoreError::Corrupt(format!("unknown entry kind: {other}"))),
        }
    }
}

/// Immutable journal record, written in the same transaction as the balance
/// change it describes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    #[serde(rename = "accountId")]
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub currency: Currency,
    pub amount: u64,
    #[serde(rename = "balanceBefore")]
    pub balance_before: u64,
    #[serde(rename = "balanceAfter")]
    pub balance_after: u64,
    pub description: String,
    pub metadata: Value,
    #[serde(rename = "createdAt")]
    pub created_at_ms: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("account not found")]
    AccountNotFound,
    #[error("sender account not found")]
    SenderNotFound,
    #[error("recipient account not found")]
    RecipientNotFound,
    #[error("insufficient {currency} balance: balance={balance} required={required}")]
    InsufficientFunds {
        currency: Currency,
        balance: u64,
        required: u64,
    },
    #[error("email already registered")]
    EmailTaken,
    #[error("refresh token invalid or expired")]
    RefreshTokenInvalid,
    #[error("balance overflow")]
    BalanceOverflow,
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound | StoreError::SenderNotFound => {
                GatewayError::AccountNotFound
            }
            StoreError::RecipientNotFound => GatewayError::RecipientNotFound,
            StoreError::InsufficientFunds { currency, .. } => {
                GatewayError::InsufficientFunds(format!("Insufficient {currency} balance"))
            }
            StoreError::EmailTaken => {
                GatewayError::Validation("email already registered".to_string())
            }
            StoreError::RefreshTokenInvalid => GatewayError::InvalidToken,
            StoreError::BalanceOverflow => {
                GatewayError::Validation("amount too large".to_string())
            }
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

/// Account and journal persistence. Every balance-changing operation is a
/// single serialized SQLite transaction; the journal entry commits with the
/// balance write or not at all.
#[derive(Clone, Debug)]
pub struct LedgerStore {
    path: PathBuf,
}

struct NewEntry {
    id: String,
    uid: String,
    kind: EntryKind,
    currency: Currency,
    amount: u64,
    balance_before: u64,
    balance_after: u64,
    description: String,
    metadata: Value,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;
            Ok(())
        })
        .await?
    }

    pub async fn create_account(
        &self,
        email: &str,
        password_salt: &str,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let path = self.path.clone();
        let uid = uuid::Uuid::new_v4().to_string();
        let email = email.to_string();
        let salt = password_salt.to_string();
        let hash = password_hash.to_string();
        let ts_ms = now_millis();

        tokio::task::spawn_blocking(move || -> Result<Account, StoreError> {
            let mut conn = open_connection(path)?;
            init_schema(&conn)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let taken: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM accounts WHERE email = ?1",
                rusqlite::params![email],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::EmailTaken);
            }

            tx.execute(
                "INSERT INTO accounts (uid, email, password_salt, password_hash, status, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![uid, email, salt, hash, AccountStatus::Active.as_str(), ts_ms],
            )?;
            tx.commit()?;

            Ok(Account {
                uid,
                email,
                status: AccountStatus::Active,
                balances: zero_balances(),
                created_at_ms: ts_ms,
            })
        })
        .await?
    }

    pub async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(String, String, String)>, StoreError> {
        let path = self.path.clone();
        let email = email.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<(String, String, String)>, StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;
            let row = conn
                .query_row(
                    "SELECT uid, password_salt, password_hash FROM accounts WHERE email = ?1",
                    rusqlite::params![email],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            Ok(row)
        })
        .await?
    }

    pub async fn get_account(&self, uid: &str) -> Result<Account, StoreError> {
        let path = self.path.clone();
        let uid = uid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Account, StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;

            let row = conn
                .query_row(
                    "SELECT email, status, created_at_ms FROM accounts WHERE uid = ?1",
                    rusqlite::params![uid],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;
            let Some((email, status, created_at_ms)) = row else {
                return Err(StoreError::AccountNotFound);
            };

            let mut balances = zero_balances();
            let mut stmt =
                conn.prepare("SELECT currency, amount FROM balances WHERE uid = ?1")?;
            let rows = stmt.query_map(rusqlite::params![uid], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (code, amount) = row?;
                let currency = code
                    .parse::<Currency>()
                    .map_err(|err| StoreError::Corrupt(err.to_string()))?;
                balances.insert(currency, i64_to_u64(amount));
            }

            Ok(Account {
                uid,
                email,
                status: AccountStatus::parse(&status)?,
                balances,
                created_at_ms,
            })
        })
        .await?
    }

    /// Credits `amount` and journals a `deposit` entry. Returns the new
    /// balance in the deposited currency.
    pub async fn deposit(
        &self,
        uid: &str,
        currency: Currency,
        amount: u64,
        description: &str,
    ) -> Result<u64, StoreError> {
        let path = self.path.clone();
        let uid = uid.to_string();
        let description = description.to_string();
        let entry_id = uuid::Uuid::new_v4().to_string();

        tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
            let mut conn = open_connection(path)?;
            init_schema(&conn)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !account_exists(&tx, &uid)? {
                return Err(StoreError::AccountNotFound);
            }
            let before = read_balance(&tx, &uid, currency)?;
            let after = before
                .checked_add(amount)
                .ok_or(StoreError::BalanceOverflow)?;
            write_balance(&tx, &uid, currency, after)?;
            append_entry(
                &tx,
                &NewEntry {
                    id: entry_id,
                    uid: uid.clone(),
                    kind: EntryKind::Deposit,
                    currency,
                    amount,
                    balance_before: before,
                    balance_after: after,
                    description,
                    metadata: serde_json::json!({}),
                },
            )?;
            tx.commit()?;
            Ok(after)
        })
        .await?
    }

    /// Debits a completion's cost from the USD balance and journals an
    /// `llm_usage` entry, atomically. The in-transaction balance read is the
    /// authoritative overdraft check.
    pub async fn debit_usage(
        &self,
        uid: &str,
        cost_usd_micros: u64,
        description: &str,
        metadata: Value,
    ) -> Result<u64, StoreError> {
        let path = self.path.clone();
        let uid = uid.to_string();
        let description = description.to_string();
        let entry_id = uuid::Uuid::new_v4().to_string();

        tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
            let mut conn = open_connection(path)?;
            init_schema(&conn)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !account_exists(&tx, &uid)? {
                return Err(StoreError::AccountNotFound);
            }
            let before = read_balance(&tx, &uid, Currency::USD)?;
            if before < cost_usd_micros {
                return Err(StoreError::InsufficientFunds {
                    currency: Currency::USD,
                    balance: before,
                    required: cost_usd_micros,
                });
            }
            let after = before - cost_usd_micros;
            write_balance(&tx, &uid, Currency::USD, after)?;
            append_entry(
                &tx,
                &NewEntry {
                    id: entry_id,
                    uid: uid.clone(),
                    kind: EntryKind::LlmUsage,
                    currency: Currency::USD,
                    amount: cost_usd_micros,
                    balance_before: before,
                    balance_after: after,
                    description,
                    metadata,
                },
            )?;
            tx.commit()?;
            Ok(after)
        })
        .await?
    }

    /// Moves `amount` between two accounts with paired `transfer_out` /
    /// `transfer_in` entries. Both balance writes and both entries commit
    /// together or not at all. Returns the sender's new balance.
    pub async fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        currency: Currency,
        amount: u64,
        description: &str,
    ) -> Result<u64, StoreError> {
        let path = self.path.clone();
        let sender = sender.to_string();
        let recipient = recipient.to_string();
        let description = description.to_string();
        let out_id = uuid::Uuid::new_v4().to_string();
        let in_id = uuid::Uuid::new_v4().to_string();

        tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
            let mut conn = open_connection(path)?;
            init_schema(&conn)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !account_exists(&tx, &sender)? {
                return Err(StoreError::SenderNotFound);
            }
            if !account_exists(&tx, &recipient)? {
                return Err(StoreError::RecipientNotFound);
            }

            let sender_before = read_balance(&tx, &sender, currency)?;
            if sender_before < amount {
                return Err(StoreError::InsufficientFunds {
                    currency,
                    balance: sender_before,
                    required: amount,
                });
            }
            let recipient_before = read_balance(&tx, &recipient, currency)?;
            let recipient_after = recipient_before
                .checked_add(amount)
                .ok_or(StoreError::BalanceOverflow)?;
            let sender_after = sender_before - amount;

            write_balance(&tx, &sender, currency, sender_after)?;
            write_balance(&tx, &recipient, currency, recipient_after)?;
            append_entry(
                &tx,
                &NewEntry {
                    id: out_id,
                    uid: sender.clone(),
                    kind: EntryKind::TransferOut,
                    currency,
                    amount,
                    balance_before: sender_before,
                    balance_after: sender_after,
                    description: description.clone(),
                    metadata: serde_json::json!({ "counterparty": recipient }),
                },
            )?;
            append_entry(
                &tx,
                &NewEntry {
                    id: in_id,
                    uid: recipient.clone(),
                    kind: EntryKind::TransferIn,
                    currency,
                    amount,
                    balance_before: recipient_before,
                    balance_after: recipient_after,
                    description,
                    metadata: serde_json::json!({ "counterparty": sender }),
                },
            )?;
            tx.commit()?;
            Ok(sender_after)
        })
        .await?
    }

    /// Swaps `from_amount` of one currency for `to_amount` of another inside
    /// one transaction, with a single `conversion` entry. The quote is the
    /// caller's; this method only re-verifies the source balance.
    #[allow(clippy::too_many_arguments)]
    pub async fn convert(
        &self,
        uid: &str,
        from: Currency,
        to: Currency,
        from_amount: u64,
        to_amount: u64,
        rate_used: f64,
    ) -> Result<(u64, u64), StoreError> {
        let path = self.path.clone();
        let uid = uid.to_string();
        let entry_id = uuid::Uuid::new_v4().to_string();

        tokio::task::spawn_blocking(move || -> Result<(u64, u64), StoreError> {
            let mut conn = open_connection(path)?;
            init_schema(&conn)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !account_exists(&tx, &uid)? {
                return Err(StoreError::AccountNotFound);
            }
            let from_before = read_balance(&tx, &uid, from)?;
            if from_before < from_amount {
                return Err(StoreError::InsufficientFunds {
                    currency: from,
                    balance: from_before,
                    required: from_amount,
                });
            }
            let to_before = read_balance(&tx, &uid, to)?;
            let to_after = to_before
                .checked_add(to_amount)
                .ok_or(StoreError::BalanceOverflow)?;
            let from_after = from_before - from_amount;

            write_balance(&tx, &uid, from, from_after)?;
            write_balance(&tx, &uid, to, to_after)?;
            append_entry(
                &tx,
                &NewEntry {
                    id: entry_id,
                    uid: uid.clone(),
                    kind: EntryKind::Conversion,
                    currency: from,
                    amount: from_amount,
                    balance_before: from_before,
                    balance_after: from_after,
                    description: format!("Converted {from} to {to}"),
                    metadata: serde_json::json!({
                        "fromCurrency": from,
                        "toCurrency": to,
                        "fromAmount": from_amount,
                        "toAmount": to_amount,
                        "rateUsed": rate_used,
                    }),
                },
            )?;
            tx.commit()?;
            Ok((from_after, to_after))
        })
        .await?
    }

    /// Newest-first journal page. `start_after` is the id of the last entry
    /// of the previous page; an unknown cursor yields an empty page.
    pub async fn list_transactions(
        &self,
        uid: &str,
        limit: u32,
        start_after: Option<String>,
    ) -> Result<Vec<JournalEntry>, StoreError> {
        let path = self.path.clone();
        let uid = uid.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<JournalEntry>, StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;

            let cursor_rowid = match start_after.as_deref() {
                Some(id) => {
                    let rowid: Option<i64> = conn
                        .query_row(
                            "SELECT rowid FROM transactions WHERE id = ?1 AND uid = ?2",
                            rusqlite::params![id, uid],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match rowid {
                        Some(rowid) => Some(rowid),
                        None => return Ok(Vec::new()),
                    }
                }
                None => None,
            };

            let mut stmt = conn.prepare(
                "SELECT id, kind, currency, amount, balance_before, balance_after,
                        description, metadata_json, created_at_ms
                 FROM transactions
                 WHERE uid = ?1 AND (?2 IS NULL OR rowid < ?2)
                 ORDER BY rowid DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![uid, cursor_rowid, limit],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )?;

            let mut entries = Vec::new();
            for row in rows {
                let (id, kind, currency, amount, before, after, description, metadata, ts) = row?;
                entries.push(JournalEntry {
                    id,
                    account_id: uid.clone(),
                    kind: EntryKind::parse(&kind)?,
                    currency: currency
                        .parse::<Currency>()
                        .map_err(|err| StoreError::Corrupt(err.to_string()))?,
                    amount: i64_to_u64(amount),
                    balance_before: i64_to_u64(before),
                    balance_after: i64_to_u64(after),
                    description,
                    metadata: serde_json::from_str(&metadata)?,
                    created_at_ms: ts,
                });
            }
            Ok(entries)
        })
        .await?
    }

    pub async fn insert_refresh_token(
        &self,
        token_hash: &str,
        uid: &str,
        expires_at_ms: i64,
    ) -> Result<(), StoreError> {
        let path = self.path.clone();
        let token_hash = token_hash.to_string();
        let uid = uid.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO refresh_tokens (token_hash, uid, expires_at_ms)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![token_hash, uid, expires_at_ms],
            )?;
            Ok(())
        })
        .await?
    }

    /// Consumes a refresh token. Single use: the row is deleted whether or
    /// not it is still valid, so a replayed token always fails.
    pub async fn take_refresh_token(
        &self,
        token_hash: &str,
        now_ms: i64,
    ) -> Result<String, StoreError> {
        let path = self.path.clone();
        let token_hash = token_hash.to_string();

        tokio::task::spawn_blocking(move || -> Result<String, StoreError> {
            let mut conn = open_connection(path)?;
            init_schema(&conn)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let row: Option<(String, i64)> = tx
                .query_row(
                    "SELECT uid, expires_at_ms FROM refresh_tokens WHERE token_hash = ?1",
                    rusqlite::params![token_hash],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            tx.execute(
                "DELETE FROM refresh_tokens WHERE token_hash = ?1",
                rusqlite::params![token_hash],
            )?;
            tx.commit()?;

            match row {
                Some((uid, expires_at_ms)) if expires_at_ms > now_ms => Ok(uid),
                _ => Err(StoreError::RefreshTokenInvalid),
            }
        })
        .await?
    }
}

fn zero_balances() -> BTreeMap<Currency, u64> {
    Currency::ALL.iter().map(|&currency| (currency, 0)).collect()
}

fn account_exists(tx: &rusqlite::Transaction<'_>, uid: &str) -> Result<bool, rusqlite::Error> {
    tx.query_row(
        "SELECT COUNT(*) > 0 FROM accounts WHERE uid = ?1",
        rusqlite::params![uid],
        |row| row.get(0),
    )
}

fn read_balance(
    tx: &rusqlite::Transaction<'_>,
    uid: &str,
    currency: Currency,
) -> Result<u64, rusqlite::Error> {
    let amount: Option<i64> = tx
        .query_row(
            "SELECT amount FROM balances WHERE uid = ?1 AND currency = ?2",
            rusqlite::params![uid, currency.code()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(i64_to_u64(amount.unwrap_or(0)))
}

fn write_balance(
    tx: &rusqlite::Transaction<'_>,
    uid: &str,
    currency: Currency,
    amount: u64,
) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO balances (uid, currency, amount) VALUES (?1, ?2, ?3)
         ON CONFLICT(uid, currency) DO UPDATE SET amount = excluded.amount",
        rusqlite::params![uid, currency.code(), u64_to_i64(amount)],
    )?;
    Ok(())
}

fn append_entry(tx: &rusqlite::Transaction<'_>, entry: &NewEntry) -> Result<(), StoreError> {
    let metadata = serde_json::to_string(&entry.metadata)?;
    tx.execute(
        "INSERT INTO transactions (id, uid, kind, currency, amount, balance_before,
                                   balance_after, description, metadata_json, created_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            entry.id,
            entry.uid,
            entry.kind.as_str(),
            entry.currency.code(),
            u64_to_i64(entry.amount),
            u64_to_i64(entry.balance_before),
            u64_to_i64(entry.balance_after),
            entry.description,
            metadata,
            now_millis(),
        ],
    )?;
    Ok(())
}

fn init_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            uid TEXT PRIMARY KEY NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS balances (
            uid TEXT NOT NULL,
            currency TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount >= 0),
            PRIMARY KEY (uid, currency)
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY NOT NULL,
            uid TEXT NOT NULL,
            kind TEXT NOT NULL,
            currency TEXT NOT NULL,
            amount INTEGER NOT NULL,
            balance_before INTEGER NOT NULL,
            balance_after INTEGER NOT NULL,
            description TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            created_at_ms INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_uid
            ON transactions(uid);

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            token_hash TEXT PRIMARY KEY NOT NULL,
            uid TEXT NOT NULL,
            expires_at_ms INTEGER NOT NULL
        );",
    )
}

fn open_connection(path: PathBuf) -> Result<rusqlite::Connection, rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    let _ = conn.busy_timeout(Duration::from_secs(5));
    let _ = conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
    Ok(conn)
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

fn u64_to_i64(value: u64) -> i64 {
    if value > i64::MAX as u64 {
        i64::MAX
    } else {
        value as i64
    }
}

fn i64_to_u64(value: i64) -> u64 {
    if value <= 0 {
        0
    } else {
        value as u64
    }
}
