#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use log::{error, info, warn};

use tmep_reporter::{
    blink::StatusLed,
    config::Config,
    hardware::{EmbassyClock, ReporterHardware},
    logic::{Device, ReportLoop},
    network::{self, EmbassyConnector},
    traits::TemperatureSensor,
};

// Pin assignment (ESP32-S3)
// GPIO12 - status LED, active low
// GPIO13 - DS18B20 one wire bus, 4k7 pull-up to 3V3
// GPIO4  - PIR sensor output
// GPIO5  - motion indicator, follows the PIR
// GPIO6  - motion indicator return, held low

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

async fn park() -> ! {
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    esp_println::println!("=== TMEP reporter ===");

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        esp_println::println!("[ERROR] Bad configuration: {}", e);
        park().await;
    }

    let hardware = match ReporterHardware::new(
        peripherals.GPIO12,
        peripherals.GPIO13,
        peripherals.GPIO4,
        peripherals.GPIO5,
        peripherals.GPIO6,
    ) {
        Ok(hardware) => hardware,
        Err(e) => {
            esp_println::println!("[ERROR] Hardware init failed: {}", e);
            park().await;
        }
    };

    let mut led = StatusLed::new(hardware.led, true);
    let mut clock = EmbassyClock;

    info!("Connecting to {}", config.wifi_ssid);
    let stack = match network::start(spawner, peripherals.WIFI, &config) {
        Ok(stack) => stack,
        Err(e) => {
            error!("{}", e);
            loop {
                led.blink(&mut clock, 10).await;
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };
    network::wait_for_network(stack, &mut led, &mut clock).await;

    let mut thermometer = hardware.thermometer;
    if let Err(e) = thermometer.init() {
        // Each read will look for the sensor again
        warn!("Temperature sensor not ready: {}", e);
    }

    led.startup_complete(&mut clock).await;

    let report_loop = ReportLoop::new(&config);
    info!(
        "Reporting to {} every {} minute(s)",
        report_loop.host(),
        config.interval_minutes
    );

    let mut device = Device {
        thermometer,
        motion: hardware.motion,
        indicator: hardware.indicator,
        led,
        network: EmbassyConnector::new(stack),
        clock,
    };

    report_loop.run(&mut device).await
}
