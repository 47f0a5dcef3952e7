use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "[{elapsed_precise}] [ {bar:50} ] {pos}/{len} {msg} {spinner}";
const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner} {msg}";

pub fn single_pb(length: u64) -> ProgressBar {
    let pb = ProgressBar::new(length);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#|-"),
    );
    pb
}

/// Ticking spinner for a step of unknown length, e.g. loading a large preset.
///
/// It is drawn through `multi`, so it can sit below a [`single_pb`] that was
/// added to the same `MultiProgress` without the two overwriting each other.
pub fn spinner(multi: &MultiProgress, msg: impl Into<String>) -> ProgressBar {
    let pb = multi.add(ProgressBar::new_spinner());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn bar_tracks_length() {
        let pb = single_pb(3);
        pb.inc(2);
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.position(), 2);
        pb.finish_and_clear();
    }

    #[test]
    fn spinner_shares_the_bar_target_and_clears() {
        let multi = hidden();
        let bar = multi.add(single_pb(2));
        let loading = spinner(&multi, "loading security.json");
        assert_eq!(loading.message(), "loading security.json");
        assert!(!loading.is_finished());

        loading.finish_and_clear();
        bar.inc(1);
        assert!(loading.is_finished());
        assert!(!bar.is_finished());
        bar.finish_and_clear();
    }
}
