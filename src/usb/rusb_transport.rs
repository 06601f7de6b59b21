// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `rusb`-backed [`Transport`] implementation.
//!
//! Wire values (request codes, buffer lengths, the `0x3dN` value field per
//! operation) are reproduced verbatim from `kl.py`'s `Transceiver` class —
//! they're vendor-specific HID class requests with no public datasheet to
//! re-derive them from.

use std::thread;
use std::time::Duration;

use rusb::{Direction, Recipient, RequestType, UsbContext};

use crate::error::{DriverError, DriverResult};

use super::Transport;

const TIMEOUT: Duration = Duration::from_secs(1);
const USB_WAIT: Duration = Duration::from_millis(50);

/// The dongle's vendor OUT requests all ride on standard request `0x09`; its
/// IN reads all ride on `0x01` (`CLEAR_FEATURE`, repurposed).
const SET_REQUEST: u8 = 0x09;
const GET_REQUEST: u8 = 0x01;

pub struct RusbTransport {
    context: rusb::Context,
    handle: Option<rusb::DeviceHandle<rusb::Context>>,
}

impl RusbTransport {
    pub fn new() -> DriverResult<Self> {
        Ok(RusbTransport {
            context: rusb::Context::new()?,
            handle: None,
        })
    }

    fn handle(&self) -> DriverResult<&rusb::DeviceHandle<rusb::Context>> {
        self.handle.as_ref().ok_or(DriverError::DeviceNotFound)
    }

    fn out_type() -> u8 {
        rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface)
    }

    fn in_type() -> u8 {
        rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface)
    }

    fn find_devices(&self, vid: u16, pid: u16) -> DriverResult<Vec<rusb::Device<rusb::Context>>> {
        let mut matches = Vec::new();
        for device in self.context.devices()?.iter() {
            if let Ok(desc) = device.device_descriptor() {
                if desc.vendor_id() == vid && desc.product_id() == pid {
                    matches.push(device);
                }
            }
        }
        Ok(matches)
    }

    /// Open and claim a candidate device, running the fixed descriptor-read
    /// sequence the dongle expects before it'll answer class requests.
    fn open_and_quiesce(device: &rusb::Device<rusb::Context>) -> DriverResult<rusb::DeviceHandle<rusb::Context>> {
        let mut handle = device.open()?;
        let _ = handle.detach_kernel_driver(0);
        handle.claim_interface(0)?;
        handle.set_alternate_setting(0, 0)?;

        let device_in = rusb::request_type(Direction::In, RequestType::Standard, Recipient::Device);
        let mut buf = [0u8; 0x12];
        let _ = handle.read_control(device_in, 0x06, 0x0100, 0, &mut buf, TIMEOUT);
        thread::sleep(USB_WAIT);

        let mut buf = [0u8; 0x09];
        let _ = handle.read_control(device_in, 0x06, 0x0200, 0, &mut buf, TIMEOUT);
        thread::sleep(USB_WAIT);

        let mut buf = [0u8; 0x22];
        let _ = handle.read_control(device_in, 0x06, 0x0200, 0, &mut buf, TIMEOUT);
        thread::sleep(USB_WAIT);

        handle.write_control(Self::out_type(), 0x0a, 0x0000, 0, &[], TIMEOUT)?;
        thread::sleep(USB_WAIT);

        let iface_in = rusb::request_type(Direction::In, RequestType::Standard, Recipient::Interface);
        let mut buf = vec![0u8; 0x2a9];
        let _ = handle.read_control(iface_in, 0x06, 0x2200, 0, &mut buf, TIMEOUT);
        thread::sleep(USB_WAIT);

        Ok(handle)
    }

    /// Read 7 bytes from config flash and format them the way the original
    /// driver compares serials: each byte rendered as two decimal digits.
    fn read_serial(handle: &rusb::DeviceHandle<rusb::Context>) -> DriverResult<String> {
        let bytes = Self::read_config_flash_on(handle, 0x1F9, 7)?;
        Ok(bytes.iter().map(|b| format!("{b:02}")).collect())
    }

    fn read_config_flash_on(handle: &rusb::DeviceHandle<rusb::Context>, mut addr: u16, mut nbytes: usize) -> DriverResult<Vec<u8>> {
        let mut out = Vec::with_capacity(nbytes);
        while nbytes > 0 {
            let mut req = [0xccu8; 0x0f];
            req[0] = 0xdd;
            req[1] = 0x0a;
            req[2] = (addr >> 8) as u8;
            req[3] = addr as u8;
            handle.write_control(Self::out_type(), SET_REQUEST, 0x03dd, 0, &req, TIMEOUT)?;

            let mut reply = [0u8; 0x15];
            handle.read_control(Self::in_type(), GET_REQUEST, 0x03dc, 0, &mut reply, TIMEOUT)?;

            let chunk = nbytes.min(16);
            out.extend_from_slice(&reply[4..4 + chunk]);
            nbytes -= chunk;
            addr += 16;
        }
        Ok(out)
    }
}

impl Transport for RusbTransport {
    fn open(&mut self, vid: u16, pid: u16, serial: Option<&str>) -> DriverResult<()> {
        let candidates = self.find_devices(vid, pid)?;
        if candidates.is_empty() {
            return Err(DriverError::DeviceNotFound);
        }

        for device in &candidates {
            let handle = Self::open_and_quiesce(device)?;
            match serial {
                None => {
                    self.handle = Some(handle);
                    return Ok(());
                }
                Some(want) => {
                    if let Ok(got) = Self::read_serial(&handle) {
                        if got == want {
                            self.handle = Some(handle);
                            return Ok(());
                        }
                    }
                    let _ = handle.release_interface(0);
                }
            }
        }
        Err(DriverError::DeviceNotFound)
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.release_interface(0);
        }
    }

    fn get_state(&mut self) -> DriverResult<[u8; 2]> {
        let handle = self.handle()?;
        let mut buf = [0u8; 0x0a];
        handle.read_control(Self::in_type(), GET_REQUEST, 0x03de, 0, &mut buf, TIMEOUT)?;
        Ok([buf[1], buf[2]])
    }

    fn get_frame(&mut self) -> DriverResult<(usize, Vec<u8>)> {
        let handle = self.handle()?;
        let mut buf = [0u8; 0x111];
        handle.read_control(Self::in_type(), GET_REQUEST, 0x03d6, 0, &mut buf, TIMEOUT)?;
        let nbytes = (((buf[1] as usize) << 8) | buf[2] as usize) & 0x1ff;
        let mut data = vec![0u8; 0x131];
        data[..nbytes].copy_from_slice(&buf[3..3 + nbytes]);
        Ok((nbytes, data))
    }

    fn set_frame(&mut self, data: &[u8]) -> DriverResult<()> {
        let handle = self.handle()?;
        let nbytes = data.len();
        let mut buf = [0u8; 0x111];
        buf[0] = 0xd5;
        buf[1] = (nbytes >> 8) as u8;
        buf[2] = nbytes as u8;
        buf[3..3 + nbytes].copy_from_slice(data);
        handle.write_control(Self::out_type(), SET_REQUEST, 0x03d5, 0, &buf, TIMEOUT)?;
        Ok(())
    }

    fn set_rx(&mut self) -> DriverResult<()> {
        let handle = self.handle()?;
        let mut buf = [0u8; 0x15];
        buf[0] = 0xd0;
        handle.write_control(Self::out_type(), SET_REQUEST, 0x03d0, 0, &buf, TIMEOUT)?;
        Ok(())
    }

    fn set_tx(&mut self) -> DriverResult<()> {
        let handle = self.handle()?;
        let mut buf = [0u8; 0x15];
        buf[0] = 0xd1;
        handle.write_control(Self::out_type(), SET_REQUEST, 0x03d1, 0, &buf, TIMEOUT)?;
        Ok(())
    }

    fn set_state(&mut self, state: u8) -> DriverResult<()> {
        let handle = self.handle()?;
        let mut buf = [0u8; 0x15];
        buf[0] = 0xd7;
        buf[1] = state;
        handle.write_control(Self::out_type(), SET_REQUEST, 0x03d7, 0, &buf, TIMEOUT)?;
        Ok(())
    }

    fn read_config_flash(&mut self, addr: u16, nbytes: usize) -> DriverResult<Vec<u8>> {
        Self::read_config_flash_on(self.handle()?, addr, nbytes)
    }

    fn write_reg(&mut self, reg_addr: u8, data: u8) -> DriverResult<()> {
        let handle = self.handle()?;
        let buf = [0xf0, reg_addr & 0x7F, 0x01, data, 0x00];
        handle.write_control(Self::out_type(), SET_REQUEST, 0x03f0, 0, &buf, TIMEOUT)?;
        Ok(())
    }

    fn execute(&mut self, command: u8) -> DriverResult<()> {
        let handle = self.handle()?;
        let mut buf = [0u8; 0x0f];
        buf[0] = 0xd9;
        buf[1] = command;
        handle.write_control(Self::out_type(), SET_REQUEST, 0x03d9, 0, &buf, TIMEOUT)?;
        Ok(())
    }

    fn set_preamble(&mut self, pattern: u8) -> DriverResult<()> {
        let handle = self.handle()?;
        let mut buf = [0u8; 0x15];
        buf[0] = 0xd8;
        buf[1] = pattern;
        handle.write_control(Self::out_type(), SET_REQUEST, 0x03d8, 0, &buf, TIMEOUT)?;
        Ok(())
    }
}
