//! Mouse input simulation.
//!
//! Clicks are sent with SendInput at the current cursor position, so the
//! user parks the cursor over the game before starting detection.

use anyhow::{anyhow, Result};

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSE_EVENT_FLAGS, MOUSEINPUT,
};
use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

use crate::fishing::Clicker;

/// Issues left clicks through SendInput.
#[derive(Debug, Default)]
pub struct SendInputClicker;

impl Clicker for SendInputClicker {
    fn click(&mut self) -> Result<()> {
        click_at_cursor()
    }
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dwFlags: flags,
                ..Default::default()
            },
        },
    }
}

/// Sends a left button down/up pair without moving the cursor.
pub fn click_at_cursor() -> Result<()> {
    let inputs = [
        mouse_input(MOUSEEVENTF_LEFTDOWN),
        mouse_input(MOUSEEVENTF_LEFTUP),
    ];
    let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(anyhow!(
            "SendInput delivered {} of {} events",
            sent,
            inputs.len()
        ));
    }
    Ok(())
}

/// Gets the current cursor position in screen coordinates.
pub fn get_cursor_position() -> Result<(i32, i32)> {
    let mut pt = POINT::default();
    unsafe {
        GetCursorPos(&mut pt)?;
    }
    Ok((pt.x, pt.y))
}
