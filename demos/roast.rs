use std::{env, thread, time::Duration};

use fugit::MillisDurationU32;
use hottop_driver::{
    roaster::Roaster,
    serial::{SerialSettings, SerialTransport, discover_port},
};
use inquire::Select;

// Configuration constants - adjust these for your setup
const POLL_INTERVAL_MS: u32 = 500;
const HEATER_PERCENT: i32 = 80;
const FAN_SPEED: i32 = 3;
const ROAST_DURATION: Duration = Duration::from_secs(30);
const COOL_DOWN_DURATION: Duration = Duration::from_secs(10);

fn main() {
    simple_logger::init_with_level(log::Level::Info).expect("Failed to set up logging");

    // Get serial port from command line arg, discovery, or interactive selection
    let port_name = env::args().nth(1).or_else(discover_port).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let transport = SerialTransport::new(SerialSettings::default().with_port(port_name));
    let mut roaster = Roaster::new(transport);

    if let Err(err) = roaster.connect() {
        eprintln!("[!] Serial interface not accessible: {err}");
        std::process::exit(1);
    }
    println!("[*] Successfully connected to the roaster!");

    roaster
        .set_poll_interval(MillisDurationU32::millis(POLL_INTERVAL_MS))
        .unwrap();
    roaster.set_heater(HEATER_PERCENT).unwrap();
    roaster.set_fan(FAN_SPEED).unwrap();
    roaster.set_drum_motor(true).unwrap();

    roaster
        .start(|reading| {
            println!(
                "{:>6.2} min | BT {:>6.1}F | ET {:>6.1}F | heater {:>3}%",
                reading.elapsed_minutes, reading.bean_temp, reading.external_temp, reading.heater
            );
        })
        .unwrap();

    thread::sleep(ROAST_DURATION);
    println!("Dropping the beans");
    roaster.drop().unwrap();

    thread::sleep(COOL_DOWN_DURATION);
    match roaster.end() {
        Ok(()) => println!("Roast finished"),
        Err(err) => eprintln!("Control loop failed: {err}"),
    }

    if let Some(session) = roaster.session() {
        println!(
            "{} readings between {} and {:?}",
            session.samples().len(),
            session.started_at(),
            session.ended_at()
        );
    }
}
