//! WiFi bring-up and TCP access through embassy-net

use embassy_executor::Spawner;
use embassy_net::{Runner, Stack, StackResources, dns::DnsQueryType, tcp::TcpSocket};
use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use esp_hal::{peripherals::WIFI, rng::Rng};
use esp_radio::wifi::{
    ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState,
};
use log::{error, info, warn};
use static_cell::StaticCell;

use crate::{
    blink::StatusLed,
    config::Config,
    error::NetError,
    traits::{Clock, Connection, TcpConnector},
};

const SOCKET_BUFFER_SIZE: usize = 1536;
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

/// Start the radio, the WiFi reconnect task and the network stack.
///
/// Returns as soon as the tasks are running; use [`wait_for_network`] to
/// block until DHCP has handed out an address.
pub fn start(
    spawner: Spawner,
    wifi: WIFI<'static>,
    config: &Config,
) -> Result<Stack<'static>, NetError> {
    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(e) => {
            error!("esp_radio init failed: {:?}", e);
            return Err(NetError::Radio);
        }
    };

    let (controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())
        .map_err(|e| {
            error!("WiFi init failed: {:?}", e);
            NetError::Radio
        })?;

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );

    if let Err(e) = spawner.spawn(connection(controller, config.wifi_ssid, config.wifi_password)) {
        error!("Failed to spawn WiFi task: {:?}", e);
    }
    if let Err(e) = spawner.spawn(net_task(runner)) {
        error!("Failed to spawn network task: {:?}", e);
    }

    Ok(stack)
}

/// Blink the "connecting" pattern until the stack has an IPv4 address
pub async fn wait_for_network<L: OutputPin, C: Clock>(
    stack: Stack<'_>,
    led: &mut StatusLed<L>,
    clock: &mut C,
) {
    while !stack.is_config_up() {
        led.connecting(clock).await;
    }

    info!("WiFi connected");
    if let Some(config) = stack.config_v4() {
        info!("IP address: {}", config.address.address());
    }
}

#[embassy_executor::task]
async fn connection(
    mut controller: WifiController<'static>,
    ssid: &'static str,
    password: &'static str,
) {
    loop {
        if esp_radio::wifi::sta_state() == WifiStaState::Connected {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("WiFi disconnected");
            Timer::after(RECONNECT_DELAY).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(ssid.into())
                    .with_password(password.into()),
            );
            if let Err(e) = controller.set_config(&client) {
                error!("WiFi set_config failed: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
                continue;
            }
            info!("Starting WiFi");
            if let Err(e) = controller.start_async().await {
                error!("WiFi start failed: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
                continue;
            }
        }

        info!("Connecting to {}", ssid);
        match controller.connect_async().await {
            Ok(()) => info!("Associated with {}", ssid),
            Err(e) => {
                warn!("Failed to connect to WiFi: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Opens one TCP socket at a time over the shared stack
pub struct EmbassyConnector<'s> {
    stack: Stack<'s>,
    rx_buffer: [u8; SOCKET_BUFFER_SIZE],
    tx_buffer: [u8; SOCKET_BUFFER_SIZE],
}

impl<'s> EmbassyConnector<'s> {
    pub fn new(stack: Stack<'s>) -> Self {
        Self {
            stack,
            rx_buffer: [0; SOCKET_BUFFER_SIZE],
            tx_buffer: [0; SOCKET_BUFFER_SIZE],
        }
    }
}

impl TcpConnector for EmbassyConnector<'_> {
    type Connection<'a>
        = TcpSocket<'a>
    where
        Self: 'a;

    async fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection<'_>, NetError> {
        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS lookup for {} failed: {:?}", host, e);
                NetError::Dns
            })?;
        let address = *addresses.first().ok_or(NetError::Dns)?;

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        socket.connect((address, port)).await.map_err(|e| {
            warn!("TCP connect to {}:{} failed: {:?}", address, port, e);
            NetError::Connect
        })?;

        Ok(socket)
    }
}

impl Connection for TcpSocket<'_> {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let written = self.write(remaining).await.map_err(|_| NetError::Write)?;
            if written == 0 {
                return Err(NetError::Write);
            }
            remaining = &remaining[written..];
        }
        self.flush().await.map_err(|_| NetError::Write)
    }

    fn response_available(&mut self) -> bool {
        self.can_recv()
    }

    async fn close(&mut self) {
        TcpSocket::close(self);
        let _ = self.flush().await;
    }

    async fn abort(&mut self) {
        TcpSocket::abort(self);
        let _ = self.flush().await;
    }
}
