//! Minimal W3C WebDriver client for an Appium automation server.

use std::time::Duration;

use async_trait::async_trait;
use fleet_protocol::{ElementHandle, Gesture, Lookup, Rect, Selector, SessionOptions, WindowSize};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::automation::{SessionOpener, UiSession};
use crate::error::{Result, RuntimeError};

/// W3C web element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Session creation installs and boots the on-device server and can take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Opens sessions against an automation server such as `http://127.0.0.1:4723`.
#[derive(Debug, Clone)]
pub struct WebDriverOpener {
	client: Client,
	base_url: String,
}

impl WebDriverOpener {
	pub fn new(base_url: impl Into<String>) -> Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}
}

#[async_trait]
impl SessionOpener for WebDriverOpener {
	async fn open(&self, options: &SessionOptions) -> Result<Box<dyn UiSession>> {
		let body = json!({
			"capabilities": {
				"alwaysMatch": options.to_capabilities(),
				"firstMatch": [{}],
			}
		});
		let url = format!("{}/session", self.base_url);
		let value = call(&self.client, Method::POST, &url, Some(body)).await?;
		let session_id = value
			.get("sessionId")
			.and_then(Value::as_str)
			.ok_or_else(|| RuntimeError::Protocol("new session response lacks sessionId".to_string()))?
			.to_string();

		info!(
			target = "fleet.webdriver",
			device = %options.udid,
			port = options.system_port,
			session = %session_id,
			"session opened"
		);

		Ok(Box::new(WebDriverSession {
			client: self.client.clone(),
			base: format!("{}/session/{}", self.base_url, session_id),
			session_id,
		}))
	}
}

/// [`UiSession`] over WebDriver HTTP endpoints.
#[derive(Debug, Clone)]
pub struct WebDriverSession {
	client: Client,
	base: String,
	session_id: String,
}

impl WebDriverSession {
	async fn get(&self, path: &str) -> Result<Value> {
		call(&self.client, Method::GET, &format!("{}{}", self.base, path), None).await
	}

	async fn post(&self, path: &str, body: Value) -> Result<Value> {
		call(&self.client, Method::POST, &format!("{}{}", self.base, path), Some(body)).await
	}

	async fn lookup(&self, path: &str, selector: &Selector) -> Result<Lookup> {
		let body = json!({ "using": selector.strategy.as_wire(), "value": selector.value });
		match self.post(path, body).await {
			Ok(value) => element_from(&value).map(Lookup::Found),
			Err(RuntimeError::WebDriver { error, .. }) if error == "no such element" => Ok(Lookup::NotFound),
			Err(e) => Err(e),
		}
	}
}

#[async_trait]
impl UiSession for WebDriverSession {
	fn id(&self) -> &str {
		&self.session_id
	}

	async fn find(&self, selector: &Selector) -> Result<Lookup> {
		self.lookup("/element", selector).await
	}

	async fn find_within(&self, parent: &ElementHandle, selector: &Selector) -> Result<Lookup> {
		self.lookup(&format!("/element/{}/element", parent.0), selector).await
	}

	async fn text(&self, element: &ElementHandle) -> Result<String> {
		let value = self.get(&format!("/element/{}/text", element.0)).await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn click(&self, element: &ElementHandle) -> Result<()> {
		self.post(&format!("/element/{}/click", element.0), json!({})).await?;
		Ok(())
	}

	async fn is_displayed(&self, element: &ElementHandle) -> Result<bool> {
		let value = self.get(&format!("/element/{}/displayed", element.0)).await?;
		Ok(value.as_bool().unwrap_or(false))
	}

	async fn rect(&self, element: &ElementHandle) -> Result<Rect> {
		let value = self.get(&format!("/element/{}/rect", element.0)).await?;
		Ok(Rect {
			x: int_field(&value, "x")?,
			y: int_field(&value, "y")?,
			width: int_field(&value, "width")?,
			height: int_field(&value, "height")?,
		})
	}

	async fn perform(&self, gesture: &Gesture) -> Result<()> {
		self.post("/actions", gesture_payload(gesture)).await?;
		Ok(())
	}

	async fn window_size(&self) -> Result<WindowSize> {
		let value = self.get("/window/rect").await?;
		Ok(WindowSize {
			width: int_field(&value, "width")?,
			height: int_field(&value, "height")?,
		})
	}

	async fn current_package(&self) -> Result<String> {
		let value = self.get("/appium/device/current_package").await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn navigate(&self, url: &str) -> Result<()> {
		self.post("/url", json!({ "url": url })).await?;
		Ok(())
	}

	async fn quit(&self) -> Result<()> {
		debug!(target = "fleet.webdriver", session = %self.session_id, "deleting session");
		call(&self.client, Method::DELETE, &self.base, None).await?;
		Ok(())
	}
}

async fn call(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
	let mut request = client.request(method, url);
	if let Some(body) = body {
		request = request.json(&body);
	}

	let response = request.send().await?;
	let status = response.status();
	let text = response.text().await?;
	let payload: Value = if text.trim().is_empty() {
		Value::Null
	} else {
		serde_json::from_str(&text).map_err(|e| RuntimeError::Protocol(format!("invalid JSON from {}: {}", url, e)))?
	};

	if let Some(err) = error_from(status.as_u16(), &payload) {
		return Err(err);
	}
	Ok(payload.get("value").cloned().unwrap_or(Value::Null))
}

fn error_from(status: u16, payload: &Value) -> Option<RuntimeError> {
	let value = payload.get("value");
	let error = value.and_then(|v| v.get("error")).and_then(Value::as_str);
	if (200..300).contains(&status) && error.is_none() {
		return None;
	}

	Some(RuntimeError::WebDriver {
		status,
		error: error.unwrap_or("unknown error").to_string(),
		message: value
			.and_then(|v| v.get("message"))
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string(),
	})
}

fn element_from(value: &Value) -> Result<ElementHandle> {
	value
		.get(ELEMENT_KEY)
		.or_else(|| value.get("ELEMENT"))
		.and_then(Value::as_str)
		.map(|id| ElementHandle(id.to_string()))
		.ok_or_else(|| RuntimeError::Protocol(format!("element reference missing in {}", value)))
}

fn int_field(value: &Value, key: &str) -> Result<i32> {
	value
		.get(key)
		.and_then(Value::as_f64)
		.map(|n| n as i32)
		.ok_or_else(|| RuntimeError::Protocol(format!("field `{}` missing in {}", key, value)))
}

/// Renders a single-finger touch as a W3C pointer action sequence.
fn gesture_payload(gesture: &Gesture) -> Value {
	json!({
		"actions": [{
			"type": "pointer",
			"id": "finger",
			"parameters": { "pointerType": "touch" },
			"actions": [
				{ "type": "pointerMove", "duration": 0, "origin": "viewport", "x": gesture.from.x, "y": gesture.from.y },
				{ "type": "pointerDown", "button": 0 },
				{ "type": "pointerMove", "duration": gesture.duration_ms, "origin": "viewport", "x": gesture.to.x, "y": gesture.to.y },
				{ "type": "pointerUp", "button": 0 },
			],
		}]
	})
}
