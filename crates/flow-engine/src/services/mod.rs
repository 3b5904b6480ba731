pub mod callback_service;
pub mod dispatch_service;

pub use callback_service::CallbackService;
pub use dispatch_service::DispatchService;
