//! Image upload to the file-transfer server
//!
//! Uploads are blocking FTP sessions; callers run them on the blocking pool.

use std::io::Cursor;

use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Upload errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file-transfer host not configured")]
    NotConfigured,

    #[error("ftp error: {0}")]
    Ftp(#[from] FtpError),

    #[error("tls setup failed: {0}")]
    Tls(#[from] suppaftp::native_tls::Error),

    #[error("upload task failed: {0}")]
    Task(String),
}

/// Destination for generated images
pub trait ImageUploader: Send + Sync {
    /// Store `data` under `name` at the root of the remote storage
    fn upload(&self, name: &str, data: &[u8]) -> Result<(), UploadError>;
}

/// FTP (optionally explicit-TLS) uploader
#[derive(Debug, Clone)]
pub struct FtpUploader {
    host: String,
    port: u16,
    user: String,
    password: String,
    secure: bool,
}

impl FtpUploader {
    /// Create an uploader from the server configuration
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.ftp_host.clone(),
            port: config.ftp_port,
            user: config.ftp_user.clone(),
            password: config.ftp_password.clone(),
            secure: config.ftp_secure,
        }
    }

    fn connect(&self) -> Result<NativeTlsFtpStream, UploadError> {
        let stream = NativeTlsFtpStream::connect((self.host.as_str(), self.port))?;
        if !self.secure {
            return Ok(stream);
        }
        let connector = NativeTlsConnector::from(TlsConnector::new()?);
        Ok(stream.into_secure(connector, &self.host)?)
    }

    fn transfer(
        &self,
        stream: &mut NativeTlsFtpStream,
        name: &str,
        data: &[u8],
    ) -> Result<(), UploadError> {
        stream.login(self.user.as_str(), self.password.as_str())?;
        stream.transfer_type(FileType::Binary)?;
        let written = stream.put_file(format!("/{}", name), &mut Cursor::new(data))?;
        debug!("Uploaded {} ({} bytes written)", name, written);
        Ok(())
    }
}

impl ImageUploader for FtpUploader {
    fn upload(&self, name: &str, data: &[u8]) -> Result<(), UploadError> {
        if self.host.is_empty() {
            return Err(UploadError::NotConfigured);
        }

        debug!(
            "Uploading {} ({} bytes) to {}:{}",
            name,
            data.len(),
            self.host,
            self.port
        );

        let mut stream = self.connect()?;
        let result = self.transfer(&mut stream, name, data);

        // Close the session whether or not the transfer succeeded
        let _ = stream.quit();

        result
    }
}
