crate::define_service! {
    platform => PlatformServices {
        timer_ticks() -> u64;
        timer_frequency() -> u32;
        timer_sleep_ms(ms: u32);

        console_putc(c: u8);
        @no_wrapper console_puts(s: &[u8]);

        rng_next() -> u64;
    }
}

#[inline(always)]
pub fn console_puts(s: &[u8]) {
    (platform_services().console_puts)(s)
}

#[inline(always)]
pub fn get_time_ms() -> u64 {
    let ticks = timer_ticks();
    let freq = timer_frequency();
    if freq == 0 {
        return 0;
    }
    (ticks * 1000) / freq as u64
}
