//! GlobalPlatform application implementation
//!
//! [`GlobalPlatform`] couples a [`TransportSession`] with a [`SecureChannel`]
//! and scripts the card content management flows on top of them: card reset
//! and card manager selection, SCP02 authentication, DELETE, INSTALL and
//! segmented LOAD. Administrative commands are C-MAC wrapped once the channel
//! is authenticated.

use bytes::Bytes;
use cardcheck_apdu_core::{
    ApduCommand, CardTransport, Command, Exchange, Expectation, ResetKind, Response,
    TransportConfig, TransportSession,
};
use tracing::{debug, info};

use crate::{
    Error, Result,
    commands::{DeleteCommand, ExternalAuthenticateCommand, InstallCommand, SelectCommand},
    config::HarnessConfig,
    constants::CARD_MANAGER_AID,
    load::{BLOCK_SIZE, LoadCommandStream},
    secure_channel::{ChannelOptions, ChannelState, SecureChannel, SecurityLevel},
    session::StaticKeys,
};

/// Response data most cards return for INSTALL [for load] and the last LOAD
const LOAD_ACK: &[u8] = &[0x00];

/// Privileges granted by [`GlobalPlatform::install`]
const DEFAULT_PRIVILEGES: &[u8] = &[0x00];

/// GlobalPlatform card management application
#[derive(Debug)]
pub struct GlobalPlatform<T: CardTransport> {
    session: TransportSession<T>,
    channel: SecureChannel,
    card_manager_aid: Bytes,
    reset_kind: ResetKind,
    block_size: usize,
}

impl<T: CardTransport> GlobalPlatform<T> {
    /// Create an instance with the default test keys and settings
    pub fn new(transport: T) -> Self {
        Self::with_parts(
            TransportSession::new(transport),
            SecureChannel::new(StaticKeys::default(), ChannelOptions::default()),
        )
    }

    /// Create an instance from a harness configuration
    pub fn with_config(transport: T, config: &HarnessConfig) -> Result<Self> {
        let keys = config.secure_channel.static_keys()?;
        let mut gp = Self::with_parts(
            TransportSession::with_config(transport, config.transport_config()),
            SecureChannel::new(keys, config.secure_channel.channel_options()),
        );
        gp.card_manager_aid = Bytes::from(config.secure_channel.card_manager_aid()?);
        gp.reset_kind = if config.reader.cold_reset {
            ResetKind::Cold
        } else {
            ResetKind::Warm
        };
        gp.block_size = config.load.block_size;
        Ok(gp)
    }

    /// Assemble an instance from an existing session and channel
    pub fn with_parts(session: TransportSession<T>, channel: SecureChannel) -> Self {
        Self {
            session,
            channel,
            card_manager_aid: Bytes::from_static(CARD_MANAGER_AID),
            reset_kind: ResetKind::Cold,
            block_size: BLOCK_SIZE,
        }
    }

    /// Set the reset performed by [`card`](Self::card)
    pub const fn set_reset_kind(&mut self, kind: ResetKind) {
        self.reset_kind = kind;
    }

    /// Reset the card and select the card manager, returning its FCI
    ///
    /// Any secure channel session is dropped.
    pub fn card(&mut self) -> Result<Bytes> {
        self.session.check_cancelled()?;
        self.channel.reset();
        self.session.reset(self.reset_kind)?;
        let aid = self.card_manager_aid.clone();
        self.select(&aid)
    }

    /// Select an application by AID
    pub fn select(&mut self, aid: &[u8]) -> Result<Bytes> {
        self.dispatch(&SelectCommand::by_name(aid), Expectation::new())
    }

    /// Open a secure channel with the configured keys and options
    pub fn auth(&mut self) -> Result<()> {
        let initialize = self.channel.begin();
        let card = self.dispatch(&initialize, Expectation::new())?;
        self.channel.process_initialize_update(card)?;

        let external = self.channel.external_authenticate()?;
        let expect = Expectation::new().name(ExternalAuthenticateCommand::NAME);
        let outcome = self
            .session
            .send_command(&external, &expect)
            .map_err(Error::from)
            .and_then(ExternalAuthenticateCommand::parse_response);
        self.channel.finish_authentication(outcome)?;

        info!(
            level = ?self.channel.options().security_level,
            "Secure channel established"
        );
        Ok(())
    }

    /// Open a secure channel with specific keys and options
    pub fn auth_with(&mut self, keys: StaticKeys, options: ChannelOptions) -> Result<()> {
        self.channel.configure(keys, options);
        self.auth()
    }

    /// Delete an object, and its related objects when `related` is set
    pub fn delete(&mut self, aid: &[u8], related: bool) -> Result<()> {
        self.dispatch(&DeleteCommand::with_aid(aid, related)?, Expectation::new())
    }

    /// INSTALL [for load]
    pub fn install_for_load(
        &mut self,
        load_file_aid: &[u8],
        security_domain_aid: &[u8],
        data_block_hash: &[u8],
        load_parameters: &[u8],
        load_token: &[u8],
    ) -> Result<()> {
        let command = InstallCommand::for_load(
            load_file_aid,
            security_domain_aid,
            data_block_hash,
            load_parameters,
            load_token,
        )?;
        let expect = Expectation::new()
            .data(Bytes::from_static(LOAD_ACK))
            .info("for load");
        self.dispatch(&command, expect).map(drop)
    }

    /// Transfer a load file in numbered LOAD blocks
    ///
    /// The block size is capped at 247 while commands carry a C-MAC.
    pub fn load(&mut self, load_file: &[u8], block_size: usize) -> Result<()> {
        let block_size = if self.mac_active() && block_size > BLOCK_SIZE {
            debug!(requested = block_size, used = BLOCK_SIZE, "LOAD block size capped");
            BLOCK_SIZE
        } else {
            block_size
        };

        let stream = LoadCommandStream::new(load_file, block_size)?;
        let total = stream.blocks_count();
        for command in stream {
            let mut expect = Expectation::new().info(format!(
                "block {}/{}",
                usize::from(command.block_number()) + 1,
                total
            ));
            if command.is_last() {
                expect = expect.data(Bytes::from_static(LOAD_ACK));
            }
            self.dispatch(&command, expect)?;
        }
        debug!(bytes = load_file.len(), blocks = total, "Load file transferred");
        Ok(())
    }

    /// INSTALL [for load] into the card manager, then LOAD
    pub fn upload(&mut self, load_file_aid: &[u8], load_file: &[u8]) -> Result<()> {
        let security_domain = self.card_manager_aid.clone();
        self.install_for_load(load_file_aid, &security_domain, &[], &[], &[])?;
        self.load(load_file, self.block_size)?;
        info!(
            aid = %hex::encode_upper(load_file_aid),
            bytes = load_file.len(),
            "Load file uploaded"
        );
        Ok(())
    }

    /// INSTALL [for install], optionally making the application selectable
    #[allow(clippy::too_many_arguments)]
    pub fn install_for_install(
        &mut self,
        load_file_aid: &[u8],
        module_aid: &[u8],
        application_aid: &[u8],
        privileges: &[u8],
        install_parameters: &[u8],
        install_token: &[u8],
        make_selectable: bool,
    ) -> Result<()> {
        let command = InstallCommand::for_install(
            load_file_aid,
            module_aid,
            application_aid,
            privileges,
            install_parameters,
            install_token,
            make_selectable,
        )?;
        let info = if make_selectable {
            "for install and make selectable"
        } else {
            "for install"
        };
        self.dispatch(&command, Expectation::new().info(info))
            .map(drop)
    }

    /// Install and make selectable an instance of `applet_aid` from `package_aid`
    ///
    /// Without an applet AID the module is assumed to share the instance AID.
    pub fn install(
        &mut self,
        instance_aid: &[u8],
        package_aid: &[u8],
        applet_aid: Option<&[u8]>,
    ) -> Result<()> {
        let module_aid = applet_aid.unwrap_or(instance_aid);
        self.install_for_install(
            package_aid,
            module_aid,
            instance_aid,
            DEFAULT_PRIVILEGES,
            &[],
            &[],
            true,
        )
    }

    /// Send a raw APDU, C-MAC wrapped when the channel requires it
    pub fn send(&mut self, apdu: &[u8], expect: &Expectation) -> Result<Response> {
        let command = Command::from_bytes(apdu)?;
        if self.needs_wrap(&command)? {
            let wrapped = self.channel.wrap(&command)?;
            Ok(self.session.send_command(&wrapped, expect)?)
        } else {
            Ok(self.session.send(apdu, expect)?)
        }
    }

    /// Hex form of [`send`](Self::send): returns response data and status word as hex
    pub fn send_hex(
        &mut self,
        apdu: &str,
        expect_data: &str,
        expect_sw: &str,
    ) -> Result<(String, String)> {
        let raw = hex::decode(apdu)
            .map_err(|_| cardcheck_apdu_core::Error::InvalidHex { field: "apdu" })?;
        let expect = Expectation::from_hex(expect_data, expect_sw)?;
        let response = self.send(&raw, &expect)?;
        Ok((response.data_hex(), response.status().to_string()))
    }

    /// The secure channel
    pub const fn channel(&self) -> &SecureChannel {
        &self.channel
    }

    /// The transport session
    pub const fn session(&self) -> &TransportSession<T> {
        &self.session
    }

    /// Mutable transport session
    pub const fn session_mut(&mut self) -> &mut TransportSession<T> {
        &mut self.session
    }

    /// Exchange settings
    pub const fn transport_config(&self) -> &TransportConfig {
        self.session.config()
    }

    /// The most recent exchange
    pub const fn last_exchange(&self) -> Option<&Exchange> {
        self.session.last_exchange()
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.session.into_transport()
    }

    /// Send a typed command, wrapping it when the channel requires it
    ///
    /// Status words are left to the command's `parse_response`, which reports
    /// failures as [`Error::Protocol`] for the step.
    fn dispatch<C>(&mut self, command: &C, expect: Expectation) -> Result<C::Success>
    where
        C: ApduCommand<Error = Error>,
    {
        let mut apdu = command.to_command();
        if self.needs_wrap(&apdu)? {
            apdu = self.channel.wrap(&apdu)?;
        }
        let response = self.session.send_command(&apdu, &expect.name(C::NAME))?;
        C::parse_response(response)
    }

    /// GlobalPlatform commands are wrapped once authenticated and refused after a rejection
    fn needs_wrap(&self, command: &Command) -> Result<bool> {
        if !command.is_proprietary() {
            return Ok(false);
        }
        match self.channel.state() {
            ChannelState::Authenticated => Ok(true),
            ChannelState::Rejected => Err(Error::InvalidState {
                expected: ChannelState::Authenticated,
                actual: ChannelState::Rejected,
            }),
            ChannelState::Unauthenticated | ChannelState::Initialized => Ok(false),
        }
    }

    fn mac_active(&self) -> bool {
        self.channel.is_authenticated()
            && self.channel.options().security_level == SecurityLevel::CMac
    }
}
