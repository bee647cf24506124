//! Connectivity check
//!
//! Joins the configured WiFi network, then requests `/` from the report host
//! and prints what happened at each step. No reading is sent.

#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use esp_backtrace as _;
use esp_hal::{
    delay::Delay,
    gpio::{Level, Output, OutputConfig},
    timer::timg::TimerGroup,
};

use tmep_reporter::{
    blink::{BlinkCode, StatusLed},
    config::{Config, HTTP_PORT, RESPONSE_POLL_INTERVAL, RESPONSE_TIMEOUT},
    hardware::EmbassyClock,
    logic::ReportLoop,
    network::{self, EmbassyConnector},
    traits::{Connection, TcpConnector},
};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    esp_println::println!("=== WiFi Test ===");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let config = Config::from_env();
    let mut led = StatusLed::new(
        Output::new(peripherals.GPIO12, Level::High, OutputConfig::default()),
        true,
    );
    let mut clock = EmbassyClock;

    esp_println::println!("[WIFI] Connecting to {}", config.wifi_ssid);
    let stack = match network::start(spawner, peripherals.WIFI, &config) {
        Ok(stack) => stack,
        Err(e) => {
            esp_println::println!("[ERROR] {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    let started = Instant::now();
    network::wait_for_network(stack, &mut led, &mut clock).await;
    esp_println::println!(
        "[WIFI] Network up after {} ms",
        started.elapsed().as_millis()
    );

    let report_loop = ReportLoop::new(&config);
    let mut connector = EmbassyConnector::new(stack);
    let code = check_report_host(&report_loop, &mut connector).await;

    loop {
        led.signal(&mut clock, code).await;
        Timer::after(Duration::from_secs(2)).await;
    }
}

async fn check_report_host(
    report_loop: &ReportLoop,
    connector: &mut EmbassyConnector<'_>,
) -> BlinkCode {
    esp_println::println!("[TCP] Connecting to {}:{}", report_loop.host(), HTTP_PORT);
    let mut connection = match connector.connect(report_loop.host(), HTTP_PORT).await {
        Ok(connection) => connection,
        Err(e) => {
            esp_println::println!("[TCP] {}", e);
            return BlinkCode::ConnectFailure;
        }
    };
    esp_println::println!("[TCP] Connected");

    esp_println::println!("[HTTP] GET /");
    if let Err(e) = connection
        .send(report_loop.connectivity_request().as_bytes())
        .await
    {
        esp_println::println!("[HTTP] {}", e);
    }

    let sent = Instant::now();
    while !connection.response_available() {
        if sent.elapsed() > RESPONSE_TIMEOUT {
            esp_println::println!("[HTTP] No response");
            Connection::abort(&mut connection).await;
            return BlinkCode::ResponseTimeout;
        }
        Timer::after(RESPONSE_POLL_INTERVAL).await;
    }

    esp_println::println!("[HTTP] Response after {} ms", sent.elapsed().as_millis());
    Connection::close(&mut connection).await;
    BlinkCode::Delivered
}
