//! Transport seam between the transmit loop and the HTTP collaborator.

use async_trait::async_trait;
use tether_model::Command;

use crate::error::TransportError;

/// Command-level transport contract the transmit loop drives.
///
/// One `transmit` call carries one sealed batch and blocks until the remote
/// side answers with the resulting command batch; the long-poll listener
/// batch blocks until data exists or the poll is released. No timeouts are
/// imposed here; blocking duration is the implementation's responsibility.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Transmits one batch and returns the response commands in wire order.
	async fn transmit(&self, commands: &[Command]) -> Result<Vec<Command>, TransportError>;

	/// Best-effort out-of-band request asking the remote side to return the
	/// outstanding long poll early. Must be a no-op when no poll is open.
	async fn release(&self) -> Result<(), TransportError>;
}

/// Raw payload exchange implemented at the HTTP seam.
///
/// Implementations move opaque strings; the codec is applied by
/// [`CodecTransport`] so wire fidelity stays this crate's concern.
#[async_trait]
pub trait WireExchange: Send + Sync {
	/// Sends one encoded request payload, returns the encoded response.
	async fn exchange(&self, payload: String) -> Result<String, TransportError>;

	/// Out-of-band release request.
	async fn release(&self) -> Result<(), TransportError>;
}

/// Adapter applying the wire codec around a raw payload exchange.
pub struct CodecTransport<E> {
	exchange: E,
}

impl<E> CodecTransport<E> {
	/// Wraps a raw exchange.
	pub fn new(exchange: E) -> Self {
		Self { exchange }
	}
}

#[async_trait]
impl<E: WireExchange> Transport for CodecTransport<E> {
	async fn transmit(&self, commands: &[Command]) -> Result<Vec<Command>, TransportError> {
		let payload = tether_codec::encode(commands)?;
		let response = self.exchange.exchange(payload).await?;
		Ok(tether_codec::decode(&response)?)
	}

	async fn release(&self) -> Result<(), TransportError> {
		self.exchange.release().await
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;

	struct EchoExchange {
		seen: Mutex<Vec<String>>,
	}

	#[async_trait]
	impl WireExchange for EchoExchange {
		async fn exchange(&self, payload: String) -> Result<String, TransportError> {
			self.seen.lock().unwrap().push(payload.clone());
			Ok(payload)
		}

		async fn release(&self) -> Result<(), TransportError> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn codec_transport_round_trips_batches() {
		let transport = CodecTransport::new(EchoExchange { seen: Mutex::new(Vec::new()) });
		let batch = vec![Command::StartLongPoll, Command::Empty];
		let response = transport.transmit(&batch).await.unwrap();
		assert_eq!(response, batch);
	}

	struct GarbageExchange;

	#[async_trait]
	impl WireExchange for GarbageExchange {
		async fn exchange(&self, _payload: String) -> Result<String, TransportError> {
			Ok("not a batch".to_owned())
		}

		async fn release(&self) -> Result<(), TransportError> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn malformed_response_surfaces_as_decode_error() {
		let transport = CodecTransport::new(GarbageExchange);
		let err = transport.transmit(&[Command::Empty]).await.unwrap_err();
		assert!(matches!(err, TransportError::Decode(_)));
	}
}
