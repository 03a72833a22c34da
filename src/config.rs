use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use color_eyre::eyre::{bail, eyre, Context};
use color_eyre::Result;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::inventory::parse_date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub name: String,
    pub id: u32,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_stores", deserialize_with = "deserialize_stores")]
    pub stores: Vec<Store>,
    #[serde(default = "default_categories")]
    pub categories: Vec<u32>,
    #[serde(default = "default_cex_base_url")]
    pub cex_base_url: Url,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_file_name")]
    pub file_name: PathBuf,
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: i64,
    #[serde(default = "default_true")]
    pub highlight_rows: bool,
    #[serde(default, deserialize_with = "deserialize_today")]
    pub today: Option<NaiveDate>,
    #[serde(default = "default_drive_folder")]
    pub drive_folder: String,
    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: Url,
    #[serde(default = "default_client_secrets_path")]
    pub client_secrets_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default)]
    pub skip_upload: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

const DEFAULT_STORES: &str = "Edinburgh=54,Leith=3115,CameronToll=3017";

fn default_stores() -> Vec<Store> {
    parse_stores(DEFAULT_STORES).unwrap_or_default()
}

fn default_categories() -> Vec<u32> {
    vec![51, 667, 1030, 1071, 403, 1037, 673]
}

fn default_cex_base_url() -> Url {
    Url::parse("https://wss2.cex.uk.webuy.io/v3/").expect("valid default url")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36".into()
}

fn default_file_name() -> PathBuf {
    "cex_stock.xlsx".into()
}

const fn default_grace_period_days() -> i64 {
    1
}

const fn default_true() -> bool {
    true
}

fn default_drive_folder() -> String {
    "games".into()
}

fn default_drive_api_base() -> Url {
    Url::parse("https://www.googleapis.com/").expect("valid default url")
}

fn default_client_secrets_path() -> PathBuf {
    "creds.json".into()
}

fn default_token_path() -> PathBuf {
    "token.json".into()
}

fn parse_stores(raw: &str) -> Result<Vec<Store>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<Store> {
            let (name, id) = pair
                .split_once('=')
                .ok_or_else(|| eyre!("store {pair:?} is not in name=id form"))?;
            Ok(Store {
                name: name.trim().to_string(),
                id: id
                    .trim()
                    .parse()
                    .wrap_err_with(|| format!("store {name:?} has a non-numeric id"))?,
            })
        })
        .collect()
}

fn deserialize_stores<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Store>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_stores(&raw).map_err(|e| serde::de::Error::custom(format!("{e:#}")))
}

fn deserialize_today<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("TODAY {raw:?} is not DD/MM/YYYY")))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>()
            .wrap_err("failed to load config")?
            .validated()
    }

    fn validated(mut self) -> Result<Self> {
        if self.stores.is_empty() {
            bail!("no stores configured");
        }
        let mut names = HashSet::new();
        for store in &self.stores {
            if !names.insert(store.name.as_str()) {
                bail!("store {:?} is configured twice", store.name);
            }
            let bad_char = store.name.chars().any(|c| "[]:*?/\\".contains(c));
            if store.name.is_empty() || store.name.chars().count() > 31 || bad_char {
                bail!("store name {:?} cannot be used as a sheet name", store.name);
            }
        }
        if self.categories.is_empty() {
            bail!("no categories configured");
        }
        if self.grace_period_days < 0 {
            bail!("GRACE_PERIOD_DAYS must not be negative");
        }
        if !self.cex_base_url.path().ends_with('/') {
            let path = format!("{}/", self.cex_base_url.path());
            self.cex_base_url.set_path(&path);
        }
        Ok(self)
    }
}
