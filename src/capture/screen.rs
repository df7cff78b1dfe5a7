//! Region capture using GDI BitBlt from the desktop device context.

use anyhow::{anyhow, Result};
use image::{ImageBuffer, Rgba, RgbaImage};

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC,
    HGDIOBJ, SRCCOPY,
};

use crate::fishing::{CaptureRegion, FrameSource};

/// Captures desktop regions for the detection loop.
#[derive(Debug, Default)]
pub struct GdiScreenCapture;

impl FrameSource for GdiScreenCapture {
    fn capture(&mut self, region: &CaptureRegion) -> Result<RgbaImage> {
        capture_screen_region(region)
    }
}

/// GDI handles for one capture, released in reverse order on drop.
struct CaptureDc {
    screen: HDC,
    memory: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
}

impl CaptureDc {
    fn new(width: i32, height: i32) -> Result<Self> {
        unsafe {
            let screen = GetDC(HWND::default());
            if screen.is_invalid() {
                return Err(anyhow!("GetDC failed for the desktop"));
            }

            let memory = CreateCompatibleDC(screen);
            if memory.is_invalid() {
                ReleaseDC(HWND::default(), screen);
                return Err(anyhow!("CreateCompatibleDC failed"));
            }

            let bitmap = CreateCompatibleBitmap(screen, width, height);
            if bitmap.is_invalid() {
                let _ = DeleteDC(memory);
                ReleaseDC(HWND::default(), screen);
                return Err(anyhow!("CreateCompatibleBitmap failed ({}x{})", width, height));
            }

            let previous = SelectObject(memory, bitmap);
            Ok(Self {
                screen,
                memory,
                bitmap,
                previous,
            })
        }
    }
}

impl Drop for CaptureDc {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.memory, self.previous);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.memory);
            ReleaseDC(HWND::default(), self.screen);
        }
    }
}

/// Captures the screen rectangle described by `region`.
///
/// This function:
/// 1. Copies the region from the desktop DC into a memory bitmap
/// 2. Reads it back as a top-down 32-bit DIB
/// 3. Converts from BGRA to RGBA format
///
/// The returned image always has the region's width and height.
pub fn capture_screen_region(region: &CaptureRegion) -> Result<RgbaImage> {
    let width = region.width();
    let height = region.height();
    let dc = CaptureDc::new(width as i32, height as i32)?;

    unsafe {
        BitBlt(
            dc.memory,
            0,
            0,
            width as i32,
            height as i32,
            dc.screen,
            region.x1(),
            region.y1(),
            SRCCOPY,
        )
        .map_err(|e| anyhow!("BitBlt failed for {}: {}", region, e))?;
    }

    // Negative height requests a top-down DIB
    let mut info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            biHeight: -(height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut buffer = vec![0u8; width as usize * height as usize * 4];
    let lines = unsafe {
        GetDIBits(
            dc.memory,
            dc.bitmap,
            0,
            height,
            Some(buffer.as_mut_ptr().cast()),
            &mut info,
            DIB_RGB_COLORS,
        )
    };
    drop(dc);

    if lines != height as i32 {
        return Err(anyhow!("GetDIBits copied {} of {} lines", lines, height));
    }

    // BGRA -> RGBA; GDI leaves alpha undefined
    for pixel in buffer.chunks_exact_mut(4) {
        pixel.swap(0, 2);
        pixel[3] = 255;
    }

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, buffer)
        .ok_or_else(|| anyhow!("Capture buffer does not match {}x{}", width, height))?;
    Ok(img)
}
