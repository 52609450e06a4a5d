use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for probing whether the host has a usable network path
///
/// Queried synchronously before every connect attempt and every reconnect
/// scheduling decision, so implementations must not block.
pub trait NetworkReachability: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Probe backed by the host's interface table
///
/// Reports reachable when at least one non-loopback interface is up
/// and has an address assigned.
#[derive(Debug, Clone, Default)]
pub struct InterfaceProbe;

impl NetworkReachability for InterfaceProbe {
    fn is_reachable(&self) -> bool {
        netdev::get_interfaces()
            .iter()
            .any(|iface| {
                iface.is_up()
                    && !iface.is_loopback()
                    && (!iface.ipv4.is_empty() || !iface.ipv6.is_empty())
            })
    }
}

/// Probe that always reports a reachable network
#[derive(Debug, Clone, Default)]
pub struct AlwaysReachable;

impl NetworkReachability for AlwaysReachable {
    fn is_reachable(&self) -> bool {
        true
    }
}

/// Probe backed by a flag that can be flipped at runtime
///
/// Useful when the application already tracks connectivity itself,
/// and in tests.
#[derive(Debug)]
pub struct StaticReachability {
    reachable: AtomicBool,
}

impl StaticReachability {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }
}

impl NetworkReachability for StaticReachability {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }
}
