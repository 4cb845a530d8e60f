use crate::kernel::Kernel;
use crate::service::ServiceName;

/// Collaborator-facing view of the kernel handed to a factory during
/// `create_service` and `destroy_service`.
///
/// The embedded [`Kernel`] handle is a cheap clone and may be stored by the
/// created service to register monitors or look up other services later.
/// Factories must not drive lifecycle operations for their own service name
/// from inside a factory callback; the entry is locked for the duration of
/// the call.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    kernel: Kernel,
    service_name: ServiceName,
}

impl ServiceContext {
    pub(crate) fn new(kernel: Kernel, service_name: ServiceName) -> Self {
        Self {
            kernel,
            service_name,
        }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }
}
