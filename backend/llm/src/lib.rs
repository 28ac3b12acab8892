pub mod gateway;
pub mod mock;
pub mod retry;
pub mod transport;
pub mod wire;

pub use gateway::{GatewaySettings, HttpGateway, DEFAULT_REQUEST_WINDOW, FALLBACK_REPLY};
pub use mock::{MockGateway, RecordedCall};
pub use retry::{with_retry, RetryPolicy};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use wire::{batch_instruction, classify_failure};
