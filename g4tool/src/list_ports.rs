#[derive(clap::Args, Debug)]
pub struct ListPortsOpts;

impl crate::ToolRun for ListPortsOpts {
    fn run(&self) -> anyhow::Result<()> {
        for port in serialport::available_ports()? {
            let is_receiver = matches!(
                &port.port_type,
                serialport::SerialPortType::UsbPort(usb)
                    if usb.vid == g4lib::transport::USB_VID && usb.pid == g4lib::transport::USB_PID
            );
            println!("{} {}", if is_receiver { "*" } else { " " }, port.port_name);
            if let serialport::SerialPortType::UsbPort(usb) = port.port_type {
                println!("    - USB {:04x}:{:04x}", usb.vid, usb.pid);
                if let Some(serial_number) = usb.serial_number {
                    println!("    - S/N: {serial_number}");
                }
                if let Some(manufacturer) = usb.manufacturer {
                    println!("    - {manufacturer}");
                }
                if let Some(product) = usb.product {
                    println!("    - {product}");
                }
            }
        }
        Ok(())
    }
}
