use std::path::Path;

use log::info;
use reqwest::blocking::RequestBuilder;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AccessTokenProvider;
use crate::error::StockError;
use crate::fetcher::CLIENT;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

pub struct DriveUploader<P> {
    api_base: Url,
    folder_name: String,
    tokens: P,
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

impl<P: AccessTokenProvider> DriveUploader<P> {
    pub fn new(api_base: Url, folder_name: impl Into<String>, tokens: P) -> Self {
        Self {
            api_base,
            folder_name: folder_name.into(),
            tokens,
        }
    }

    fn url(&self, path: &str) -> Result<Url, StockError> {
        self.api_base
            .join(path)
            .map_err(|e| StockError::UploadRejected(format!("bad drive url {path}: {e}")))
    }

    fn send<T: DeserializeOwned>(&mut self, request: RequestBuilder) -> Result<T, StockError> {
        let token = self.tokens.access_token()?;
        request
            .bearer_auth(token)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(StockError::Upload)
    }

    fn find(&mut self, query: String) -> Result<Option<DriveFile>, StockError> {
        let request = CLIENT.get(self.url("drive/v3/files")?).query(&[
            ("q", query.as_str()),
            ("pageSize", "10"),
            ("fields", "files(id, name)"),
        ]);
        let list: FileList = self.send(request)?;
        Ok(list.files.into_iter().next())
    }

    /// Uploads `path` into the target folder, replacing a file of the same
    /// name if one exists. Returns the name Drive reports for the file.
    pub fn upload(&mut self, path: &Path) -> Result<String, StockError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StockError::UploadRejected(format!("{} has no file name", path.display())))?
            .to_string();
        let contents = std::fs::read(path)?;

        let folder = self
            .find(format!(
                "name='{}' and mimeType='{FOLDER_MIME}' and trashed=false",
                quote(&self.folder_name)
            ))?
            .ok_or_else(|| {
                StockError::UploadRejected(format!("folder {:?} not found", self.folder_name))
            })?;
        let existing = self.find(format!(
            "name='{}' and trashed=false",
            quote(&file_name)
        ))?;

        let uploaded: DriveFile = match existing {
            Some(file) => {
                info!("{file_name} exists. Uploading new version");
                let request = CLIENT
                    .patch(self.url(&format!("upload/drive/v3/files/{}", file.id))?)
                    .query(&[("uploadType", "media"), ("fields", "id,name")])
                    .header(reqwest::header::CONTENT_TYPE, XLSX_MIME)
                    .body(contents);
                self.send(request)?
            }
            None => {
                info!("Uploading {file_name}");
                let request = CLIENT
                    .post(self.url("upload/drive/v3/files")?)
                    .query(&[("uploadType", "media"), ("fields", "id,name")])
                    .header(reqwest::header::CONTENT_TYPE, XLSX_MIME)
                    .body(contents);
                let created: DriveFile = self.send(request)?;

                let request = CLIENT
                    .patch(self.url(&format!("drive/v3/files/{}", created.id))?)
                    .query(&[("addParents", folder.id.as_str()), ("fields", "id,name")])
                    .json(&json!({ "name": file_name }));
                self.send(request)?
            }
        };

        info!("File uploaded: {}", uploaded.name);
        Ok(uploaded.name)
    }
}
