#![no_std]
#![no_main]

use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::mode::Async;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{self, BufferedUart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_graphics::pixelcolor::Rgb565;
use frame_protocol::{
    CycleOutcome, FrameRenderer, LinkConfig, Palette, StreamError, Streamer, FRAME_BYTES,
    FRAME_HEIGHT, FRAME_WIDTH,
};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

mod panel;
mod uart_link;

use panel::{Gc9307, PANEL_HEIGHT, PANEL_WIDTH};
use uart_link::UartLink;

bind_interrupts!(struct Irqs {
    USART1 => usart::BufferedInterruptHandler<peripherals::USART1>;
});

/// Interrupt-side UART buffers. RX holds more than one frame so a burst
/// never overruns while a row is being pushed to the panel.
const UART_RX_BUFFER_SIZE: usize = 2048;
const UART_TX_BUFFER_SIZE: usize = 16;

/// Progress line cadence
const LOG_EVERY_FRAMES: u32 = 300;

static UART_RX_BUF: StaticCell<[u8; UART_RX_BUFFER_SIZE]> = StaticCell::new();
static UART_TX_BUF: StaticCell<[u8; UART_TX_BUFFER_SIZE]> = StaticCell::new();
static SPI1_BUS: StaticCell<Mutex<CriticalSectionRawMutex, Spi<'static, Async>>> = StaticCell::new();

type PanelSpi = SpiDevice<'static, CriticalSectionRawMutex, Spi<'static, Async>, Output<'static>>;
type Panel = Gc9307<PanelSpi, Output<'static>, Output<'static>>;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::*;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            // Main system clock at 170 MHz
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R;
    }
    let p = embassy_stm32::init(config);
    defmt::info!("STM32G431 initialized");

    // SPI1 for the GC9307 panel, TX only
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(40_000_000);
    let spi = Spi::new_txonly(
        p.SPI1,
        p.PB3,      // SCK
        p.PB5,      // MOSI
        p.DMA1_CH3, // TX DMA
        spi_config,
    );
    let spi_bus = SPI1_BUS.init(Mutex::new(spi));

    let display_cs = Output::new(p.PA15, Level::High, Speed::VeryHigh);
    let display_dc = Output::new(p.PC14, Level::Low, Speed::VeryHigh);
    let display_rst = Output::new(p.PC15, Level::Low, Speed::VeryHigh);

    let mut panel: Panel = Gc9307::new(SpiDevice::new(spi_bus, display_cs), display_dc, display_rst);
    match panel.init().await {
        Ok(()) => defmt::info!("Display initialized"),
        // Keep going: every transfer will fail and be logged, the link still works
        Err(e) => defmt::error!("Display initialization failed: {:?}", e),
    }

    // USART1 for the frame link: PA10 RX, PA9 TX
    let link_config = LinkConfig::default();
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = link_config.baud;

    let uart = match BufferedUart::new(
        p.USART1,
        p.PA10, // RX
        p.PA9,  // TX
        UART_TX_BUF.init([0; UART_TX_BUFFER_SIZE]),
        UART_RX_BUF.init([0; UART_RX_BUFFER_SIZE]),
        Irqs,
        uart_config,
    ) {
        Ok(uart) => uart,
        Err(e) => {
            defmt::panic!("UART configuration rejected: {:?}", e);
        }
    };
    let (tx, rx) = uart.split();
    let link = UartLink::new(rx, tx, &link_config);

    let renderer: FrameRenderer<Rgb565> = FrameRenderer::new(Palette::default()).centered_on(PANEL_WIDTH, PANEL_HEIGHT);
    let mut streamer = Streamer::new(link, panel, renderer);

    if let Err(e) = streamer
        .show_splash(&["Frame receiver", "", "Waiting for", "frames..."])
        .await
    {
        defmt::warn!("Splash not shown: {:?}", e);
    }

    defmt::info!(
        "Waiting for {}x{} frames ({} bytes) at {} baud",
        FRAME_WIDTH,
        FRAME_HEIGHT,
        FRAME_BYTES,
        link_config.baud
    );

    loop {
        match streamer.run_cycle().await {
            Ok(CycleOutcome::Rendered) => {
                let stats = streamer.stats();
                if stats.frames_rendered == 1 {
                    defmt::info!("First frame received, streaming");
                } else if stats.frames_rendered % LOG_EVERY_FRAMES == 0 {
                    defmt::info!("{} frames rendered", stats.frames_rendered);
                }
            }
            // Short reads resynchronize on the next cycle's flush
            Ok(CycleOutcome::Dropped { .. }) => {}
            Err(StreamError::Link(e)) => defmt::warn!("Link error: {:?}", e),
            Err(StreamError::Display(e)) => defmt::error!("Display transfer failed: {:?}", e),
        }
    }
}
