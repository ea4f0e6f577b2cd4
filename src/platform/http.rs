use std::time::Duration;

use embedded_svc::http::client::Client;
use embedded_svc::http::Method;
use embedded_svc::io::Read;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use log::info;

use crate::error::HttpError;
use crate::hal::{HttpClient, HttpResponse};

const TIMEOUT: Duration = Duration::from_millis(15_000);
const MAX_BODY: usize = 32 * 1024;

fn transport(e: impl core::fmt::Debug) -> HttpError {
    HttpError::Transport(format!("{:?}", e))
}

/// HTTP(S) GET over the ESP-IDF client with the certificate bundle attached.
/// A fresh connection is opened per request.
pub struct EspHttp;

impl HttpClient for EspHttp {
    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        let config = Configuration {
            timeout: Some(TIMEOUT),
            use_global_ca_store: true,
            crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        let connection = EspHttpConnection::new(&config).map_err(transport)?;
        let mut client = Client::wrap(connection);

        let request = client.request(Method::Get, url, &[]).map_err(transport)?;
        let mut response = request.submit().map_err(transport)?;

        let status = response.status();
        // URLs may carry an API key; only the host and path are logged.
        let shown = url.split('?').next().unwrap_or(url);
        info!("HTTP GET {} -> status {}", shown, status);

        let mut body: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = response.read(&mut buf).map_err(transport)?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buf[..n]);
            if body.len() > MAX_BODY {
                return Err(HttpError::TooLarge { limit: MAX_BODY });
            }
        }

        let body = String::from_utf8(body).map_err(|_| HttpError::Encoding)?;
        Ok(HttpResponse { status, body })
    }
}
