use color_eyre::eyre::Result;
use serialport::SerialPortType;

pub fn run() -> Result<()> {
    let ports = dmxctl::link::available_ports()?;
    if ports.is_empty() {
        warn!("no serial ports found");
    }

    for port in ports {
        match port.port_type {
            SerialPortType::UsbPort(usb) => println!(
                "{}\t{:04x}:{:04x} {} {}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.manufacturer.as_deref().unwrap_or(""),
                usb.product.as_deref().unwrap_or(""),
            ),
            _ => println!("{}", port.port_name),
        }
    }

    Ok(())
}
