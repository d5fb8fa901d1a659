//! Builder for configuring and constructing an [`Autoconnector`].

use crate::chain::{AudioPlayerLookup, ChainModel, StaticChainModel};
use crate::config::AutoconnectConfig;
use crate::engine::{Autoconnector, Shared, State};
use crate::midi_routes::OutputPolicy;
use crate::watchdog::RunState;
use crate::Result;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use patchbay_core::{OwnershipLedger, RoutingServer, ServerStats, ServerTelemetry};
use patchbay_devices::{
    AliasTable, DeviceRegistry, DriverBindings, DriverRegistry, HostLinkProbe, IdentityManager,
    NoRouterControl, RouterControl, SysfsUdcProbe,
};
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

/// Without a routing server the autoconnector still builds, in a degraded mode
/// where every pass is a no-op.
///
/// # Example
///
/// ```ignore
/// use patchbay::prelude::*;
///
/// let chains = Arc::new(StaticChainModel::default());
/// let autoconnector = Autoconnector::builder()
///     .server(MemoryServer::new())
///     .chains(chains.clone())
///     .build()?;
/// ```
pub struct AutoconnectorBuilder {
    config: AutoconnectConfig,
    server: Option<Box<dyn RoutingServer>>,
    chains: Option<Arc<dyn ChainModel>>,
    player: Option<Arc<dyn AudioPlayerLookup>>,
    drivers: DriverRegistry,
    router: Option<Box<dyn RouterControl>>,
    host_link: Option<Arc<dyn HostLinkProbe>>,
    telemetry: Option<Arc<ServerTelemetry>>,
    aliases: AliasTable,

    #[cfg(feature = "jack")]
    connect_jack: bool,
}

impl Default for AutoconnectorBuilder {
    fn default() -> Self {
        Self {
            config: AutoconnectConfig::default(),
            server: None,
            chains: None,
            player: None,
            drivers: DriverRegistry::new(),
            router: None,
            host_link: None,
            telemetry: None,
            aliases: AliasTable::new(),

            #[cfg(feature = "jack")]
            connect_jack: false,
        }
    }
}

impl AutoconnectorBuilder {
    pub fn config(mut self, config: AutoconnectConfig) -> Self {
        self.config = config;
        self
    }

    pub fn server(mut self, server: impl RoutingServer + 'static) -> Self {
        self.server = Some(Box::new(server));
        self
    }

    /// Connect to JACK at build time under the configured client name.
    #[cfg(feature = "jack")]
    pub fn jack(mut self) -> Self {
        self.connect_jack = true;
        self
    }

    /// Default: an empty [`StaticChainModel`].
    pub fn chains(mut self, chains: Arc<dyn ChainModel>) -> Self {
        self.chains = Some(chains);
        self
    }

    pub fn audio_player(mut self, player: Arc<dyn AudioPlayerLookup>) -> Self {
        self.player = Some(player);
        self
    }

    pub fn drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    /// Receives passthrough switches when drivers bind and unbind.
    pub fn router_control(mut self, router: impl RouterControl + 'static) -> Self {
        self.router = Some(Box::new(router));
        self
    }

    /// Default: the UDC state under the configured sysfs root.
    pub fn host_link(mut self, probe: Arc<dyn HostLinkProbe>) -> Self {
        self.host_link = Some(probe);
        self
    }

    /// Share xrun and CPU counters with the server callback. Default: the
    /// counters of the configured server, if it keeps any.
    pub fn telemetry(mut self, telemetry: Arc<ServerTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Friendly names restored from saved settings.
    pub fn aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn build(self) -> Result<Autoconnector> {
        self.config.validate()?;
        let config = self.config;
        #[allow(unused_mut)]
        let mut server = self.server;
        let telemetry = self
            .telemetry
            .or_else(|| server.as_ref().and_then(|s| s.telemetry()))
            .unwrap_or_default();

        #[cfg(feature = "jack")]
        if server.is_none() && self.connect_jack {
            match patchbay_core::JackServer::connect(&config.client_name, Arc::clone(&telemetry)) {
                Ok(jack) => server = Some(Box::new(jack)),
                Err(e) => tracing::error!("Cannot connect to JACK: {}", e),
            }
        }

        if server.is_none() {
            tracing::warn!("No routing server, autoconnect disabled");
        }

        let identity = IdentityManager::new(&config.sysfs_root)
            .with_services(config.virtual_services.clone())
            .with_din5_patterns(config.din5_patterns.clone())
            .with_host_link_patterns(config.host_link_patterns.clone());
        let host_link = self
            .host_link
            .unwrap_or_else(|| Arc::new(SysfsUdcProbe::new(&config.sysfs_root)));
        let stats = server
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or_else(ServerStats::default);

        let state = State {
            server,
            registry: DeviceRegistry::new(config.slot_capacity),
            identity,
            aliases: self.aliases,
            midi_ledger: OwnershipLedger::new(),
            audio_ledger: OwnershipLedger::new(),
            bindings: DriverBindings::new(),
            router: self.router.unwrap_or_else(|| Box::new(NoRouterControl)),
            policy: OutputPolicy::default(),
            pitch_tracking: false,
            host_link_up: false,
            hardware_signature: Vec::new(),
        };

        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let shared = Shared {
            chains: self
                .chains
                .unwrap_or_else(|| Arc::new(StaticChainModel::default())),
            player: self.player,
            drivers: self.drivers,
            host_link,
            telemetry,
            stats: ArcSwap::from_pointee(stats),
            run_state: AtomicU8::new(RunState::Stopped as u8),
            commands_tx,
            commands_rx,
            state: Mutex::new(state),
            config,
        };

        Ok(Autoconnector::from_shared(Arc::new(shared)))
    }
}
