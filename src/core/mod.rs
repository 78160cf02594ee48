//! Providers, probing, dispatch and rendering.

pub mod availability;
pub mod credentials;
pub mod dispatch;
pub mod events;
pub mod fallback;
pub mod history;
pub mod http;
pub mod logging;
pub mod provider;
pub mod renderer;
pub mod session;
pub mod wire;

pub use availability::{AvailabilitySnapshot, ProbeResult, Prober, SnapshotCache};
pub use credentials::{CredentialSet, Secret};
pub use dispatch::{DispatchOutcome, DispatchReply, DispatchState, Orchestrator};
pub use events::{ProviderState, StatusBoard, StatusEvent, StatusReporter};
pub use fallback::{AttemptOutcome, DispatchAttempt, FallbackPlan, FallbackTrace};
pub use history::ConversationHistory;
pub use http::{Call, ProviderClient};
pub use provider::{AuthScheme, ProviderDescriptor, ProviderRegistry, WireFormat};
pub use renderer::{BufferTarget, RenderSession, RenderStatus, RenderTarget, Renderer};
pub use session::{Answer, ChatSession};
