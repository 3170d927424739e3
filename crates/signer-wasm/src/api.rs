//! Block explorer client for fetching previous transactions and broadcasting.

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};
use signer_core::fetcher::decode_txid;
use signer_core::{Network, Tx};

/// Explorer API client.
#[wasm_bindgen]
pub struct TxApi {
    /// Base URL for the API
    base_url: String,
    network: Network,
}

#[wasm_bindgen]
impl TxApi {
    /// Create a new API client for the specified network.
    #[wasm_bindgen(constructor)]
    pub fn new(network: &str) -> Result<TxApi, JsValue> {
        let network = Network::from_str(network)
            .ok_or_else(|| JsValue::from_str("Invalid network"))?;
        Ok(TxApi {
            base_url: network.explorer_api_url().to_string(),
            network,
        })
    }

    /// Fetch a raw transaction by id and check that it hashes to that id.
    pub async fn fetch_tx_hex(&self, txid: &str) -> Result<String, JsValue> {
        let expected = decode_txid(txid).map_err(|e| JsValue::from_str(&format!("Invalid txid: {}", e)))?;
        let url = format!("{}/tx/{}/hex", self.base_url, txid.trim());
        let raw_hex = self.fetch_text(&url).await?;

        let computed = Tx::from_hex(&raw_hex)
            .and_then(|tx| tx.hash())
            .map_err(|e| JsValue::from_str(&format!("Invalid transaction: {}", e)))?;
        if computed != expected {
            return Err(JsValue::from_str(&format!(
                "different ids: {} != {}",
                hex::encode(computed),
                txid
            )));
        }
        Ok(raw_hex.trim().to_string())
    }

    /// Broadcast a raw transaction; returns the explorer's response text.
    pub async fn broadcast(&self, raw_hex: &str) -> Result<String, JsValue> {
        let url = format!("{}/tx", self.base_url);
        self.post_text(&url, raw_hex).await
    }

    /// Get the network name.
    #[wasm_bindgen(getter)]
    pub fn network(&self) -> String {
        self.network.name().to_string()
    }

    /// Get the base URL.
    #[wasm_bindgen(getter)]
    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    /// Fetch text from a URL.
    async fn fetch_text(&self, url: &str) -> Result<String, JsValue> {
        let opts = RequestInit::new();
        opts.set_method("GET");
        opts.set_mode(RequestMode::Cors);

        let request = Request::new_with_str_and_init(url, &opts)?;
        let resp = send(&request).await?;

        if !resp.ok() {
            return Err(JsValue::from_str(&format!("HTTP error: {}", resp.status())));
        }
        response_text(&resp).await
    }

    /// POST text to a URL.
    async fn post_text(&self, url: &str, body: &str) -> Result<String, JsValue> {
        let opts = RequestInit::new();
        opts.set_method("POST");
        opts.set_mode(RequestMode::Cors);
        opts.set_body(&JsValue::from_str(body));

        let request = Request::new_with_str_and_init(url, &opts)?;
        request.headers().set("Content-Type", "text/plain")?;
        let resp = send(&request).await?;

        let text = response_text(&resp).await?;
        if !resp.ok() {
            return Err(JsValue::from_str(&format!("HTTP error {}: {}", resp.status(), text)));
        }
        Ok(text)
    }
}

async fn send(request: &Request) -> Result<Response, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let resp_value = JsFuture::from(window.fetch_with_request(request)).await?;
    resp_value.dyn_into()
}

async fn response_text(resp: &Response) -> Result<String, JsValue> {
    let text = JsFuture::from(resp.text()?).await?;
    text.as_string()
        .ok_or_else(|| JsValue::from_str("Response is not a string"))
}
