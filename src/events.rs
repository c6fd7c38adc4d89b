//! The fixed event-name table.
//!
//! Maps the surface event names the analyzer recognizes to the VM label the
//! host dispatches to. Surface names outside this table lower as `_<name>`
//! and draw a `W0010` warning. A second table lists events that auto-bind an
//! implicit `result` parameter (the download callbacks).

/// Surface event name → VM entry label.
pub const EVENT_TABLE: &[(&str, &str)] = &[
    ("Start", "_start"),
    ("Update", "_update"),
    ("LateUpdate", "_lateUpdate"),
    ("FixedUpdate", "_fixedUpdate"),
    ("Enable", "_onEnable"),
    ("Disable", "_onDisable"),
    ("Destroy", "_onDestroy"),
    ("Interact", "_interact"),
    ("Pickup", "_onPickup"),
    ("Drop", "_onDrop"),
    ("PickupUseDown", "_onPickupUseDown"),
    ("PickupUseUp", "_onPickupUseUp"),
    ("MouseDown", "_onMouseDown"),
    ("MouseUp", "_onMouseUp"),
    ("PlayerJoined", "_onPlayerJoined"),
    ("PlayerLeft", "_onPlayerLeft"),
    ("PlayerRespawn", "_onPlayerRespawn"),
    ("PlayerTriggerEnter", "_onPlayerTriggerEnter"),
    ("PlayerTriggerExit", "_onPlayerTriggerExit"),
    ("PlayerCollisionEnter", "_onPlayerCollisionEnter"),
    ("PlayerCollisionExit", "_onPlayerCollisionExit"),
    ("TriggerEnter", "_onTriggerEnter"),
    ("TriggerExit", "_onTriggerExit"),
    ("CollisionEnter", "_onCollisionEnter"),
    ("CollisionExit", "_onCollisionExit"),
    ("PreSerialization", "_onPreSerialization"),
    ("PostSerialization", "_onPostSerialization"),
    ("Deserialization", "_onDeserialization"),
    ("VariableChange", "_onVariableChange"),
    ("InputJump", "_inputJump"),
    ("InputUse", "_inputUse"),
    ("InputGrab", "_inputGrab"),
    ("InputDrop", "_inputDrop"),
    ("InputMoveHorizontal", "_inputMoveHorizontal"),
    ("InputMoveVertical", "_inputMoveVertical"),
    ("InputLookHorizontal", "_inputLookHorizontal"),
    ("InputLookVertical", "_inputLookVertical"),
    ("OwnershipRequest", "_onOwnershipRequest"),
    ("OwnershipTransferred", "_onOwnershipTransferred"),
    ("StringLoadSuccess", "_onStringLoadSuccess"),
    ("StringLoadError", "_onStringLoadError"),
    ("ImageLoadSuccess", "_onImageLoadSuccess"),
    ("ImageLoadError", "_onImageLoadError"),
    ("AvatarChanged", "_onAvatarChanged"),
    ("AvatarEyeHeightChanged", "_onAvatarEyeHeightChanged"),
    ("VideoEnd", "_onVideoEnd"),
    ("VideoError", "_onVideoError"),
    ("VideoLoop", "_onVideoLoop"),
    ("VideoPause", "_onVideoPause"),
    ("VideoPlay", "_onVideoPlay"),
    ("VideoReady", "_onVideoReady"),
    ("VideoStart", "_onVideoStart"),
];

/// Events that auto-bind a `result` parameter when the handler declares none,
/// and the Udon type it carries.
pub const IMPLICIT_PARAM_TABLE: &[(&str, &str)] = &[
    ("StringLoadSuccess", "VRCSDK3StringLoadingIVRCStringDownload"),
    ("StringLoadError", "VRCSDK3StringLoadingIVRCStringDownload"),
    ("ImageLoadSuccess", "VRCSDK3ImageIVRCImageDownload"),
    ("ImageLoadError", "VRCSDK3ImageIVRCImageDownload"),
];

/// VM label for a surface event name, if the table knows it.
pub fn vm_label(surface: &str) -> Option<&'static str> {
    EVENT_TABLE
        .iter()
        .find(|(name, _)| *name == surface)
        .map(|(_, label)| *label)
}

/// Implicit `result` parameter type for download-callback events.
pub fn implicit_param(surface: &str) -> Option<&'static str> {
    IMPLICIT_PARAM_TABLE
        .iter()
        .find(|(name, _)| *name == surface)
        .map(|(_, ty)| *ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_events_resolve() {
        assert_eq!(vm_label("Start"), Some("_start"));
        assert_eq!(vm_label("Interact"), Some("_interact"));
        assert_eq!(vm_label("PostSerialization"), Some("_onPostSerialization"));
        assert_eq!(vm_label("Frobnicate"), None);
    }

    #[test]
    fn download_callbacks_bind_result() {
        assert_eq!(
            implicit_param("StringLoadSuccess"),
            Some("VRCSDK3StringLoadingIVRCStringDownload")
        );
        assert_eq!(implicit_param("Start"), None);
    }

    #[test]
    fn table_has_no_duplicate_surface_names() {
        let mut seen = std::collections::HashSet::new();
        for (name, _) in EVENT_TABLE {
            assert!(seen.insert(name), "duplicate event table entry {}", name);
        }
    }
}
