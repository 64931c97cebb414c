use indicatif::ProgressBar;

pub fn progress_bar(len: u64, message: String) -> Option<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .ok()?
            .progress_chars("##-")
    );
    bar.set_message(message);

    Some(bar)
}
