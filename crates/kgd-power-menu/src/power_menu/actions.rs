use kgd_core::RingerMode;

/// System operations behind the power menu entries.
pub trait PowerMenuHandler: Send + Sync {
    fn shutdown(&self);
    fn reboot(&self);
    fn reboot_safe_mode(&self);
    fn take_screenshot(&self);
    fn request_bug_report(&self);
    /// Open the profile chooser.
    fn choose_profile(&self);

    fn is_airplane_mode_on(&self) -> bool;
    fn set_airplane_mode(&self, on: bool);

    fn ringer_mode(&self) -> RingerMode;
    fn set_ringer_mode(&self, mode: RingerMode);

    /// The radio is in emergency callback mode; airplane mode cannot change.
    fn is_in_emergency_callback_mode(&self) -> bool {
        false
    }

    /// Ask the user to leave emergency callback mode.
    fn show_emergency_callback_exit(&self) {}
}
