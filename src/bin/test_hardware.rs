#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use tmep_reporter::{
    blink::{BlinkCode, StatusLed},
    config::Config,
    hardware::{EmbassyClock, ReporterHardware},
    logic::ReportLoop,
    model::{DEVICE_DISCONNECTED_C, MotionCode, Reading, is_fault_reading},
    traits::TemperatureSensor,
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

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

fn test_report_logic(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Report logic");

    let config = Config {
        wifi_ssid: "ssid",
        wifi_password: "pass",
        domain: "ahoj",
        guid: "mojemereni",
        interval_minutes: 1,
    };
    let report_loop = ReportLoop::new(&config);

    results.assert_eq(report_loop.host(), "ahoj.tmep.cz", "host name");

    let path = report_loop.query(&Reading {
        temperature: 23.5,
        motion: MotionCode::Idle,
    });
    results.assert_eq(path.as_str(), "/?mojemereni=23.5&humV=20", "query without motion");

    let path = report_loop.query(&Reading {
        temperature: -4.25,
        motion: MotionCode::Detected,
    });
    results.assert_eq(path.as_str(), "/?mojemereni=-4.25&humV=80", "query with motion");

    let request = report_loop.request("/?a=1&humV=20");
    results.assert(request.starts_with("GET /?a=1&humV=20 HTTP/1.1\r\n"), "request line");
    results.assert(request.contains("Host: ahoj.tmep.cz\r\n"), "host header");
    results.assert(request.ends_with("Connection: close\r\n\r\n"), "connection close header");

    results.assert(is_fault_reading(DEVICE_DISCONNECTED_C), "fault sentinel detected");
    results.assert(!is_fault_reading(21.0), "normal reading accepted");

    results.assert_eq(BlinkCode::Delivered.count(), 1, "delivered blink count");
    results.assert_eq(BlinkCode::SensorFault.count(), 2, "sensor fault blink count");
    results.assert_eq(BlinkCode::ConnectFailure.count(), 3, "connect failure blink count");
    results.assert_eq(BlinkCode::ResponseTimeout.count(), 4, "timeout blink count");
}

async fn test_ds18b20_sensor<T: TemperatureSensor>(results: &mut TestResults, sensor: &mut T) {
    esp_println::println!("\n[TEST] DS18B20 Sensor Tests");

    match sensor.init() {
        Ok(_) => {
            results.assert(true, "DS18B20 found on one wire bus");

            esp_println::println!("  Reading temperatures (5 samples)...");
            let mut temps = heapless::Vec::<f32, 5>::new();
            for i in 0..5 {
                Timer::after(Duration::from_millis(100)).await;
                match sensor.read_temperature() {
                    Ok(temp) => {
                        esp_println::println!("    Sample {}: {:.2}°C", i + 1, temp);
                        let _ = temps.push(temp);
                    }
                    Err(e) => {
                        esp_println::println!("    Failed to read temperature: {}", e);
                    }
                }
            }

            results.assert_eq(temps.len(), 5, "collected 5 temperature samples");

            if temps.len() == 5 {
                for temp in temps.iter() {
                    results.assert(!is_fault_reading(*temp), "reading is not the fault sentinel");
                    results.assert(*temp > -55.0 && *temp < 125.0, "temperature in valid range");
                }

                let min_temp = temps.iter().fold(f32::INFINITY, |a, &b| a.min(b));
                let max_temp = temps.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                results.assert(max_temp - min_temp < 2.0, "temperature readings stable (within 2°C)");
            }
        }
        Err(e) => {
            esp_println::println!("  Failed to find DS18B20: {}", e);
            results.assert(false, "DS18B20 found on one wire bus");
        }
    }
}

fn test_motion_sensor<M: InputPin, I: OutputPin>(
    results: &mut TestResults,
    motion: &mut M,
    indicator: &mut I,
) {
    esp_println::println!("\n[TEST] PIR Sensor Tests");

    match motion.is_high() {
        Ok(detected) => {
            let code = MotionCode::from_flag(detected);
            esp_println::println!("    Motion: {} (code {})", detected, code.value());
            results.assert(code.value() == 20 || code.value() == 80, "motion code is 20 or 80");
        }
        Err(_) => results.assert(false, "read PIR input"),
    }

    results.assert(indicator.set_high().is_ok(), "indicator on");
    results.assert(indicator.set_low().is_ok(), "indicator off");
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: 32 * 1024);

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Run tests that don't need hardware
    test_report_logic(&mut results);

    // Initialize RTOS timer for embassy (this consumes TIMG0)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

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
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    let mut thermometer = hardware.thermometer;
    let mut motion = hardware.motion;
    let mut indicator = hardware.indicator;

    // Run hardware tests
    test_ds18b20_sensor(&mut results, &mut thermometer).await;
    test_motion_sensor(&mut results, &mut motion, &mut indicator);

    // Print summary
    results.print_summary();

    // Keep running and blink the result on the status LED
    esp_println::println!("\nTest run complete. Looping...");
    let mut led = StatusLed::new(hardware.led, true);
    let mut clock = EmbassyClock;
    let code = if results.failed == 0 {
        BlinkCode::Delivered
    } else {
        BlinkCode::ResponseTimeout
    };
    loop {
        led.signal(&mut clock, code).await;
        Timer::after(Duration::from_millis(2000)).await;
    }
}
